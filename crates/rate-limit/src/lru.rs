//! Arena-backed doubly linked list used as the recency order of the bucket
//! registry.
//!
//! Nodes live in a `Vec` and link to each other by index. Freed slots are
//! recycled through a free list, so every operation is O(1) and no node is
//! ever moved once inserted. A [`Handle`] stays valid until the node it
//! points at is removed.

/// Index of a node in the list arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(Node<T>),
    Free { next_free: Option<usize> },
}

/// Front is the most recently used end, back the least recently used.
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Slot<T>>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Option<usize>,
    len: usize,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
            free: None,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_front(&mut self, value: T) -> Handle {
        let node = Node {
            value,
            prev: None,
            next: self.head,
        };

        let idx = match self.free {
            Some(idx) => {
                if let Slot::Free { next_free } = self.slots[idx] {
                    self.free = next_free;
                }
                self.slots[idx] = Slot::Occupied(node);
                idx
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                self.slots.len() - 1
            }
        };

        if let Some(old_head) = self.head {
            if let Some(n) = self.node_mut(old_head) {
                n.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
        self.len += 1;
        Handle(idx)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.node(handle.0).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.node_mut(handle.0).map(|n| &mut n.value)
    }

    /// Mark the node as most recently used.
    pub fn move_to_front(&mut self, handle: Handle) {
        if self.head == Some(handle.0) || self.node(handle.0).is_none() {
            return;
        }
        self.unlink(handle.0);
        let old_head = self.head;
        if let Some(n) = self.node_mut(handle.0) {
            n.prev = None;
            n.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(n) = self.node_mut(h) {
                n.prev = Some(handle.0);
            }
        }
        self.head = Some(handle.0);
        if self.tail.is_none() {
            self.tail = Some(handle.0);
        }
    }

    /// Handle of the least recently used node.
    pub fn back(&self) -> Option<Handle> {
        self.tail.map(Handle)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(Handle(tail))
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.node(handle.0)?;
        self.unlink(handle.0);
        let slot = std::mem::replace(
            &mut self.slots[handle.0],
            Slot::Free {
                next_free: self.free,
            },
        );
        self.free = Some(handle.0);
        self.len -= 1;
        match slot {
            Slot::Occupied(node) => Some(node.value),
            Slot::Free { .. } => None,
        }
    }

    /// Iterate from least to most recently used, yielding each handle.
    pub fn handles_from_back(&self) -> Vec<Handle> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            out.push(Handle(idx));
            cursor = self.node(idx).and_then(|n| n.prev);
        }
        out
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        match self.slots.get(idx) {
            Some(Slot::Occupied(n)) => Some(n),
            _ => None,
        }
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        match self.slots.get_mut(idx) {
            Some(Slot::Occupied(n)) => Some(n),
            _ => None,
        }
    }

    /// Detach a node from its neighbours, fixing head and tail.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.node(idx) {
            Some(n) => (n.prev, n.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(n) = self.node_mut(p) {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.node_mut(nx) {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &LruList<&'static str>) -> Vec<&'static str> {
        list.handles_from_back()
            .into_iter()
            .rev()
            .filter_map(|h| list.get(h).copied())
            .collect()
    }

    #[test]
    fn push_front_orders_most_recent_first() {
        let mut list = LruList::new();
        list.push_front("a");
        list.push_front("b");
        list.push_front("c");

        assert_eq!(order(&list), vec!["c", "b", "a"]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.back().and_then(|h| list.get(h)), Some(&"a"));
    }

    #[test]
    fn move_to_front_reorders() {
        let mut list = LruList::new();
        let a = list.push_front("a");
        list.push_front("b");
        list.push_front("c");

        list.move_to_front(a);
        assert_eq!(order(&list), vec!["a", "c", "b"]);
        assert_eq!(list.pop_back(), Some("b"));
        assert_eq!(order(&list), vec!["a", "c"]);
    }

    #[test]
    fn remove_middle_and_reuse_slot() {
        let mut list = LruList::new();
        list.push_front("a");
        let b = list.push_front("b");
        list.push_front("c");

        assert_eq!(list.remove(b), Some("b"));
        assert_eq!(list.remove(b), None);
        assert_eq!(order(&list), vec!["c", "a"]);

        let d = list.push_front("d");
        assert_eq!(d, b, "freed slot should be reused");
        assert_eq!(order(&list), vec!["d", "c", "a"]);
    }

    #[test]
    fn drain_to_empty() {
        let mut list = LruList::new();
        list.push_front(1);
        list.push_front(2);
        assert_eq!(list.pop_back(), Some(1));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert!(list.is_empty());
        assert!(list.back().is_none());

        let h = list.push_front(3);
        assert_eq!(list.back(), Some(h));
    }

    #[test]
    fn get_mut_updates_value() {
        let mut list = LruList::new();
        let h = list.push_front(10);
        if let Some(v) = list.get_mut(h) {
            *v += 5;
        }
        assert_eq!(list.get(h), Some(&15));
    }
}
