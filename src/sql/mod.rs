//! Safe SQL builder: identifiers from config only, values as text parameters.

mod builder;
pub mod find;
pub mod params;
mod where_clause;

pub use builder::*;
pub use find::{Direction, FindOptions, OrderTerm};
pub use params::*;
pub use where_clause::render_where;
