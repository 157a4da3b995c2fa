//! Shared-ownership views over driver data: [`Value`], [`Row`], [`ResultSet`]
//! and [`Cursor`], plus in-memory backends drivers can reuse.

mod cursor;
mod result_set;
mod row;
mod value;

pub use cursor::{Cursor, MaterializedCursor};
pub use result_set::{MemResult, ResultSet};
pub use row::{MemRow, Row};
pub use value::{FromValue, Value};
