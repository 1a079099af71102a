use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

/// Set-membership test for identifiers excluded from reconciliation.
pub trait IgnoreFilter {
    fn is_ignored(&self, identifier: &str) -> bool;
}

impl IgnoreFilter for BTreeSet<String> {
    fn is_ignored(&self, identifier: &str) -> bool {
        self.contains(identifier.trim())
    }
}

impl<S: BuildHasher> IgnoreFilter for HashSet<String, S> {
    fn is_ignored(&self, identifier: &str) -> bool {
        self.contains(identifier.trim())
    }
}

/// Filter that ignores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnores;

impl IgnoreFilter for NoIgnores {
    fn is_ignored(&self, _identifier: &str) -> bool {
        false
    }
}
