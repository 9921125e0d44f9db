//! Tree configuration.

/// Label cap used by [`Config::default`].
///
/// Hostnames up to this many labels are split into an inline buffer, so
/// lookups under the default cap never allocate.
pub const DEFAULT_MAX_LABELS: usize = 10;

/// Configuration for an [`SniTree`](crate::SniTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of dot-separated labels in a hostname. Longer
    /// hostnames are refused by insert and never match find or remove.
    pub max_labels: usize,
}

impl Config {
    /// Replace the label cap.
    pub fn with_max_labels(mut self, max_labels: usize) -> Self {
        self.max_labels = max_labels;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_labels: DEFAULT_MAX_LABELS,
        }
    }
}
