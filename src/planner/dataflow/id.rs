//! Node ids.

/// Id of a dataflow plan node, e.g. `rss_0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequential id source owned by one plan builder.
///
/// Ids are `<prefix>_<n>` with one counter shared across prefixes, so the
/// same build against a fresh generator always yields the same ids.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    start: u64,
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: u64) -> Self {
        Self { start, next: start }
    }

    pub fn next_id(&mut self, prefix: &str) -> NodeId {
        let id = NodeId(format!("{}_{}", prefix, self.next));
        self.next += 1;
        id
    }

    /// Restart the sequence at its initial value.
    pub fn reset(&mut self) {
        self.next = self.start;
    }
}
