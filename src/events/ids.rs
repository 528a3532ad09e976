use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// Identifiers - Runs and Tests
// ============================================================================

/// One independently ordered execution within a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(u32);

impl RunId {
    pub const FIRST: RunId = RunId(1);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

/// Hands out run ids; safe to share between workers
#[derive(Debug)]
pub struct RunIdSequence {
    next: AtomicU32,
}

impl RunIdSequence {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(RunId::FIRST.0),
        }
    }

    pub fn next_run_id(&self) -> RunId {
        RunId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for RunIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a test in the test tree of one test class.
///
/// The root is the test class itself; children are numbered from zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestId(Vec<u32>);

impl TestId {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn of(path: &[u32]) -> Self {
        Self(path.to_vec())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_child(&self) -> Self {
        let mut path = self.0.clone();
        path.push(0);
        Self(path)
    }

    /// `None` for the root, which has no siblings
    pub fn next_sibling(&self) -> Option<Self> {
        let (last, parent) = self.0.split_last()?;
        let mut path = parent.to_vec();
        path.push(last.checked_add(1)?);
        Some(Self(path))
    }

    /// `None` for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    pub fn path(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestId(")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{index}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_sequential_from_one() {
        let sequence = RunIdSequence::new();

        assert_eq!(sequence.next_run_id(), RunId::FIRST);
        assert_eq!(sequence.next_run_id(), RunId::new(2));
        assert_eq!(sequence.next_run_id().to_string(), "RunId(3)");
    }

    #[test]
    fn test_test_id_navigation() {
        let root = TestId::root();
        let first = root.first_child();
        let second = first.next_sibling().unwrap();

        assert!(root.is_root());
        assert_eq!(first, TestId::of(&[0]));
        assert_eq!(second, TestId::of(&[1]));
        assert_eq!(second.first_child(), TestId::of(&[1, 0]));
        assert_eq!(second.first_child().parent(), Some(second));
        assert_eq!(root.parent(), None);
        assert_eq!(root.next_sibling(), None);
    }

    #[test]
    fn test_test_id_display() {
        assert_eq!(TestId::root().to_string(), "TestId()");
        assert_eq!(TestId::of(&[0, 1]).to_string(), "TestId(0, 1)");
    }
}
