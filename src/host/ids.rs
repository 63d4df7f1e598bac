//! Identity handles for host objects.
//!
//! The engine never owns contexts, nodes or elements. It refers to them
//! through these lightweight handles and keeps its association tables keyed
//! by them, pruning entries when the host reports the owner is gone.

use std::fmt;

/// Handle to an audio-graph context created by the page or by the engine.
///
/// # Example
///
/// ```
/// use page_audio::ContextId;
///
/// let a = ContextId::new(1);
/// assert_eq!(a, ContextId::new(1));
/// assert_ne!(a, ContextId::new(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

/// Handle to a node inside an audio-graph context (gain, destination, source...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Handle to a DOM element. Media elements, `<source>` children and plain
/// containers all share this identity space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ContextId {
    /// Wraps a raw host identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw host identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl NodeId {
    /// Wraps a raw host identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw host identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl ElementId {
    /// Wraps a raw host identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw host identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_equality() {
        assert_eq!(ElementId::new(3), ElementId::new(3));
        assert_ne!(ElementId::new(3), ElementId::new(4));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ContextId::new(7).to_string(), "ctx#7");
        assert_eq!(NodeId::new(8).to_string(), "node#8");
        assert_eq!(ElementId::new(9).to_string(), "el#9");
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(NodeId::new(1));
        set.insert(NodeId::new(2));
        set.insert(NodeId::new(1)); // duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_id_round_trip_raw() {
        assert_eq!(ContextId::new(42).as_u64(), 42);
    }
}
