//! Per-mode FIFO waiting lists.

use std::collections::VecDeque;

use duet_protocol::{ConnectionId, Mode};

/// Ordered waiting lists, one per [`Mode`].
///
/// The queue itself knows nothing about connection state; the registry
/// keeps membership in step with `ConnectionState::Waiting`.
#[derive(Debug, Default, Clone)]
pub struct MatchQueue {
    lists: [VecDeque<ConnectionId>; 3],
}

impl MatchQueue {
    /// Creates empty waiting lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` to the tail of `mode`'s list.
    pub(crate) fn push(&mut self, mode: Mode, id: ConnectionId) {
        self.lists[mode.index()].push_back(id);
    }

    /// Removes `id` from `mode`'s list. O(k) in the list length.
    pub(crate) fn remove(&mut self, mode: Mode, id: ConnectionId) -> bool {
        let list = &mut self.lists[mode.index()];
        match list.iter().position(|&queued| queued == id) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// The two longest-waiting connections in `mode`, oldest first.
    pub fn front_pair(&self, mode: Mode) -> Option<(ConnectionId, ConnectionId)> {
        let list = &self.lists[mode.index()];
        match (list.front(), list.get(1)) {
            (Some(&a), Some(&b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Waiting connections in `mode`, oldest first.
    pub fn waiting(&self, mode: Mode) -> impl Iterator<Item = ConnectionId> + '_ {
        self.lists[mode.index()].iter().copied()
    }

    /// Returns `true` if `id` is in `mode`'s list.
    pub fn contains(&self, mode: Mode, id: ConnectionId) -> bool {
        self.lists[mode.index()].contains(&id)
    }

    /// Number of connections waiting in `mode`.
    pub fn len(&self, mode: Mode) -> usize {
        self.lists[mode.index()].len()
    }

    /// Returns `true` if nobody is waiting in any mode.
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    #[test]
    fn test_front_pair_is_oldest_first() {
        let mut q = MatchQueue::new();
        q.push(Mode::Video, cid(1));
        q.push(Mode::Video, cid(2));
        q.push(Mode::Video, cid(3));
        assert_eq!(q.front_pair(Mode::Video), Some((cid(1), cid(2))));
    }

    #[test]
    fn test_front_pair_needs_two() {
        let mut q = MatchQueue::new();
        q.push(Mode::Text, cid(1));
        assert_eq!(q.front_pair(Mode::Text), None);
    }

    #[test]
    fn test_lists_are_partitioned_by_mode() {
        let mut q = MatchQueue::new();
        q.push(Mode::Video, cid(1));
        q.push(Mode::Voice, cid(2));
        assert_eq!(q.front_pair(Mode::Video), None);
        assert_eq!(q.len(Mode::Voice), 1);
        assert!(!q.contains(Mode::Video, cid(2)));
    }

    #[test]
    fn test_remove_keeps_order_of_the_rest() {
        let mut q = MatchQueue::new();
        for n in 1..=4 {
            q.push(Mode::Voice, cid(n));
        }
        assert!(q.remove(Mode::Voice, cid(2)));
        assert!(!q.remove(Mode::Voice, cid(2)));
        let rest: Vec<_> = q.waiting(Mode::Voice).collect();
        assert_eq!(rest, vec![cid(1), cid(3), cid(4)]);
    }

    #[test]
    fn test_is_empty() {
        let mut q = MatchQueue::new();
        assert!(q.is_empty());
        q.push(Mode::Text, cid(1));
        assert!(!q.is_empty());
    }
}
