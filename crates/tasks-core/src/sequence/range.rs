use serde::{Deserialize, Serialize};

/// Last block of ids handed out for one sequence, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub from: i64,
    pub to: i64,
}

impl IdRange {
    pub fn first(size: i64) -> Self {
        Self { from: 1, to: size }
    }

    /// The block right after this one
    pub fn next(&self, size: i64) -> Self {
        Self {
            from: self.to + 1,
            to: self.to + size,
        }
    }
}
