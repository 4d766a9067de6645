pub mod cursor;

pub use cursor::{Cursor, Row};
