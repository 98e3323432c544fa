use serde::{Deserialize, Serialize};

/// Aggregate counts derived by scanning a resource list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceStatus {
    pub running: usize,
    pub pending: usize,
    pub failed: usize,
    pub succeeded: usize,
    pub unknown: usize,
    pub terminating: usize,
}

impl ResourceStatus {
    pub fn total(&self) -> usize {
        self.running + self.pending + self.failed + self.succeeded + self.unknown + self.terminating
    }
}
