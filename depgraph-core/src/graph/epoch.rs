//! Visit Epochs
//!
//! Traversals tag each node they reach with the current epoch instead of
//! keeping a visited set. A node whose stored id equals the current epoch
//! was already reached in this traversal.
//!
//! Stored ids are never cleared between traversals, so the counter must not
//! wrap silently: a stale id equal to a wrapped-around fresh one would make
//! the node look visited. When the counter hits its limit the graph rewinds
//! every node to 0 and counting restarts.

/// Value stored in nodes that no traversal has reached.
pub const UNVISITED: u32 = 0;

/// Owned epoch counter of a graph.
#[derive(Debug, Clone)]
pub struct VisitEpoch {
    current: u32,
    limit: u32,
}

impl VisitEpoch {
    /// Create a counter that rewinds once it reaches `limit`.
    pub fn new(limit: u32) -> Self {
        Self {
            current: UNVISITED,
            limit: limit.max(1),
        }
    }

    /// The most recently assigned epoch.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Whether the next assignment must rewind first.
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.limit
    }

    /// Advance to the next epoch.
    ///
    /// The caller is responsible for calling [`VisitEpoch::rewind`] and
    /// zeroing node ids when [`VisitEpoch::is_exhausted`] is true.
    pub fn advance(&mut self) -> u32 {
        debug_assert!(!self.is_exhausted(), "visit epoch advanced past its limit");
        self.current += 1;
        self.current
    }

    /// Restart counting from the initial value.
    pub fn rewind(&mut self) {
        self.current = UNVISITED;
    }
}

impl Default for VisitEpoch {
    fn default() -> Self {
        Self::new(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_increase_from_one() {
        let mut epoch = VisitEpoch::default();
        assert_eq!(epoch.current(), UNVISITED);
        assert_eq!(epoch.advance(), 1);
        assert_eq!(epoch.advance(), 2);
        assert_eq!(epoch.current(), 2);
    }

    #[test]
    fn exhausted_at_limit() {
        let mut epoch = VisitEpoch::new(2);
        epoch.advance();
        assert!(!epoch.is_exhausted());
        epoch.advance();
        assert!(epoch.is_exhausted());

        epoch.rewind();
        assert!(!epoch.is_exhausted());
        assert_eq!(epoch.advance(), 1);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let mut epoch = VisitEpoch::new(0);
        assert_eq!(epoch.advance(), 1);
        assert!(epoch.is_exhausted());
    }
}
