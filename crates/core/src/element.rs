use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a visual element (step bar, sub-step bar, decoration or
/// arrow). The layout and render tree collaborators key everything by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out element ids; never reuses one.
#[derive(Debug, Default)]
pub struct ElementAllocator {
    last: u64,
}

impl ElementAllocator {
    pub fn allocate(&mut self) -> ElementId {
        self.last += 1;
        ElementId(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut alloc = ElementAllocator::default();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(format!("{a}"), "#1");
    }
}
