use std::sync::Arc;

use proseql_store::Document;

use crate::error::{DbError, MutationKind};

/// A lifecycle callback. Receives the document the operation is about to
/// act on; an `Err` aborts the operation before any state change.
pub type HookFn = Arc<dyn Fn(&Document) -> Result<(), String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct CollectionHooks {
    pub before_create: Option<HookFn>,
    pub before_update: Option<HookFn>,
    pub before_delete: Option<HookFn>,
}

impl CollectionHooks {
    pub fn on_create(f: impl Fn(&Document) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            before_create: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    pub fn on_update(f: impl Fn(&Document) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            before_update: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    pub fn on_delete(f: impl Fn(&Document) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            before_delete: Some(Arc::new(f)),
            ..Self::default()
        }
    }
}

/// Run a hook if present, mapping a rejection into `HookError`.
pub(crate) fn run(
    hook: Option<&HookFn>,
    name: &str,
    collection: &str,
    operation: MutationKind,
    doc: &Document,
) -> Result<(), DbError> {
    match hook {
        None => Ok(()),
        Some(hook) => hook(doc).map_err(|reason| DbError::Hook {
            hook: name.to_string(),
            collection: collection.to_string(),
            operation,
            reason,
        }),
    }
}
