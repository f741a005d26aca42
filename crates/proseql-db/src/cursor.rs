use proseql_store::Document;

/// Lazy, finite, non-restartable query results.
///
/// A cursor owns cheap clones of the snapshot it was built from, so it
/// stays valid under concurrent writes — it simply keeps reading its
/// snapshot. Collect eagerly (or query inside a transaction) when a stable
/// multi-pass view is needed.
pub struct Cursor {
    inner: Box<dyn Iterator<Item = Document> + Send>,
}

impl Cursor {
    pub(crate) fn new(inner: Box<dyn Iterator<Item = Document> + Send>) -> Self {
        Self { inner }
    }

    /// Materialize the remaining results.
    pub fn collect_all(self) -> Vec<Document> {
        self.inner.collect()
    }

    /// Ids of the remaining results, in emission order.
    pub fn ids(self) -> Vec<String> {
        self.inner
            .filter_map(|doc| doc.get("id").and_then(|v| v.as_str().map(String::from)))
            .collect()
    }
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
