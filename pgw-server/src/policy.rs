//! Admission policy: the static IMSI blacklist.

use std::collections::HashSet;

/// Immutable set of identifiers barred from admission.
///
/// Built once at startup from configuration and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashSet<String>,
}

impl Blacklist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_blacklisted(&self, imsi: &str) -> bool {
        self.entries.contains(imsi)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
