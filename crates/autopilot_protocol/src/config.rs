#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestLimits {
    /// Lines longer than this are dropped from protocol parsing and kept as a log marker.
    pub max_line_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024 * 1024,
        }
    }
}
