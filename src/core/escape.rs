/// Quotes an identifier (table or column name) for inclusion in generated SQL.
///
/// Identifiers are wrapped in backticks; embedded backticks are doubled.
/// Values never pass through here, they are always bound as parameters.
pub fn escape(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push('`');
    for ch in identifier.chars() {
        if ch == '`' {
            quoted.push('`');
        }
        quoted.push(ch);
    }
    quoted.push('`');
    quoted
}
