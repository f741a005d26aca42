use crate::predicate::Where;
use crate::sort::Sort;

/// A complete query: filter, sort keys (primary first), offset/limit
/// applied after sorting, and an optional projection. `select` always
/// retains `id` on emitted entities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub filter: Option<Where>,
    pub sort: Vec<Sort>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub select: Option<Vec<String>>,
}

impl Query {
    pub fn filtered(filter: Where) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }
}
