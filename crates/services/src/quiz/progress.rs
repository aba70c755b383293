use serde::Serialize;

/// Aggregated view of quiz progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    /// One-based number of the question on screen; `total` once finished.
    pub position: usize,
    pub remaining: usize,
    pub is_complete: bool,
}
