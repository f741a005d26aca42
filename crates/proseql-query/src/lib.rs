mod parse_patch;
mod parse_where;
mod patch;
mod predicate;
mod query;
mod sort;
pub mod value;

pub use parse_patch::{PatchParseError, parse_patch};
pub use parse_where::{WhereParseError, parse_where};
pub use patch::{FieldUpdate, Patch, PatchApplyError};
pub use predicate::{Condition, FieldPredicate, Where};
pub use query::Query;
pub use sort::{Sort, SortDirection};
