use std::collections::{HashMap, HashSet, VecDeque};

use crate::element::ElementId;

/// Per-element FIFO of work that must wait until the element is attached and
/// measurable.
///
/// The queue only stores and orders actions; the owner executes them. An
/// element that is being drained is flagged so that actions registered on it
/// mid-drain are appended behind the remaining ones instead of jumping ahead.
#[derive(Debug)]
pub struct ReadyQueue<A> {
    pending: HashMap<ElementId, VecDeque<A>>,
    draining: HashSet<ElementId>,
}

impl<A> Default for ReadyQueue<A> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            draining: HashSet::new(),
        }
    }
}

impl<A> ReadyQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, element: ElementId, action: A) {
        self.pending.entry(element).or_default().push_back(action);
    }

    /// Next action for `element`, in registration order.
    pub fn next(&mut self, element: ElementId) -> Option<A> {
        let queue = self.pending.get_mut(&element)?;
        let action = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(&element);
        }
        action
    }

    /// Drop every pending action of `element` without running it. Returns
    /// how many were dropped.
    pub fn cancel(&mut self, element: ElementId) -> usize {
        self.pending.remove(&element).as_ref().map_or(0, VecDeque::len)
    }

    pub fn pending(&self, element: ElementId) -> usize {
        self.pending.get(&element).map_or(0, VecDeque::len)
    }

    pub fn iter_pending(&self, element: ElementId) -> impl Iterator<Item = &A> {
        self.pending.get(&element).into_iter().flatten()
    }

    pub fn total_pending(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Mark `element` as draining. Returns `false` if it already is, in which
    /// case the caller must not start a second drain loop.
    pub fn start_drain(&mut self, element: ElementId) -> bool {
        self.draining.insert(element)
    }

    pub fn finish_drain(&mut self, element: ElementId) {
        self.draining.remove(&element);
    }

    pub fn is_draining(&self, element: ElementId) -> bool {
        self.draining.contains(&element)
    }
}

impl<A: PartialEq> ReadyQueue<A> {
    /// Enqueue unless an equal action is already waiting on `element`.
    pub fn enqueue_once(&mut self, element: ElementId, action: A) -> bool {
        if self.iter_pending(element).any(|a| *a == action) {
            return false;
        }
        self.enqueue(element, action);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E: ElementId = ElementId::from_raw(1);
    const F: ElementId = ElementId::from_raw(2);

    #[test]
    fn actions_come_out_in_registration_order() {
        let mut queue = ReadyQueue::new();
        queue.enqueue(E, "a");
        queue.enqueue(F, "x");
        queue.enqueue(E, "b");
        queue.enqueue(E, "c");

        let mut seen = Vec::new();
        while let Some(a) = queue.next(E) {
            seen.push(a);
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(queue.pending(E), 0);
        assert_eq!(queue.pending(F), 1);
    }

    #[test]
    fn each_action_is_handed_out_once() {
        let mut queue = ReadyQueue::new();
        queue.enqueue(E, 1);
        assert_eq!(queue.next(E), Some(1));
        assert_eq!(queue.next(E), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancel_drops_without_returning() {
        let mut queue = ReadyQueue::new();
        queue.enqueue(E, 1);
        queue.enqueue(E, 2);
        queue.enqueue(F, 3);
        assert_eq!(queue.cancel(E), 2);
        assert_eq!(queue.next(E), None);
        assert_eq!(queue.total_pending(), 1);
        assert_eq!(queue.cancel(E), 0);
    }

    #[test]
    fn enqueue_once_skips_duplicates() {
        let mut queue = ReadyQueue::new();
        assert!(queue.enqueue_once(E, "redraw"));
        assert!(!queue.enqueue_once(E, "redraw"));
        assert!(queue.enqueue_once(E, "register"));
        assert_eq!(queue.pending(E), 2);
    }

    #[test]
    fn drain_flag_is_exclusive() {
        let mut queue: ReadyQueue<u8> = ReadyQueue::new();
        assert!(queue.start_drain(E));
        assert!(!queue.start_drain(E));
        assert!(queue.is_draining(E));
        queue.finish_drain(E);
        assert!(!queue.is_draining(E));
    }
}
