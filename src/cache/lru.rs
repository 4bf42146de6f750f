//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.
//!
//! ```text
//!   locator: HashMap<String, NodeId>
//!        │
//!        ▼
//!   head ─► [key_c] ◄──► [key_a] ◄──► [key_b] ◄── tail
//!           (most recent)              (least recent)
//! ```
//!
//! Nodes live in a slot arena and are linked by index, so every operation
//! below is O(1): push-front, unlink, move-to-front and pop-back.

use std::collections::HashMap;

// == Node Handle ==
/// Stable handle to a node in a [`RecencyList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    key: String,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

// == Recency List ==
/// Doubly linked list of keys ordered by access time.
///
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug, Default)]
pub struct RecencyList {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl RecencyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    // == Push Front ==
    /// Inserts `key` as the most recently used node and returns its handle.
    pub fn push_front(&mut self, key: String) -> NodeId {
        let node = Node {
            key,
            prev: None,
            next: self.head,
        };
        let id = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                NodeId(idx)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };

        match self.head {
            Some(old_head) => {
                if let Some(n) = self.node_mut(old_head) {
                    n.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
        id
    }

    /// Detaches a node from its neighbours without freeing its slot.
    fn detach(&mut self, id: NodeId) -> bool {
        let (prev, next) = match self.node(id) {
            Some(node) => (node.prev, node.next),
            None => return false,
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

        if let Some(node) = self.node_mut(id) {
            node.prev = None;
            node.next = None;
        }
        true
    }

    // == Remove ==
    /// Unlinks a node and frees its slot, returning its key.
    pub fn remove(&mut self, id: NodeId) -> Option<String> {
        if !self.detach(id) {
            return None;
        }
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(node.key)
    }

    // == Move To Front ==
    /// Marks a node as most recently used.
    pub fn move_to_front(&mut self, id: NodeId) -> bool {
        if self.head == Some(id) {
            return self.node(id).is_some();
        }
        if !self.detach(id) {
            return false;
        }

        let old_head = self.head;
        if let Some(node) = self.node_mut(id) {
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(n) = self.node_mut(h) {
                    n.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        true
    }

    // == Pop Back ==
    /// Removes and returns the least recently used key.
    pub fn pop_back(&mut self) -> Option<String> {
        let tail = self.tail?;
        self.remove(tail)
    }

    /// Returns the least recently used key without removing it.
    pub fn back(&self) -> Option<&str> {
        self.tail
            .and_then(|id| self.node(id))
            .map(|node| node.key.as_str())
    }

    /// Iterates keys from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.node(cursor?)?;
            cursor = node.next;
            Some(node.key.as_str())
        })
    }
}

// == LRU Tracker ==
/// Recency list plus the key locator that maps each key to its node.
///
/// Both halves are only ever mutated together, so the set of keys in the
/// locator always equals the set of keys in the list.
#[derive(Debug, Default)]
pub struct LruTracker {
    order: RecencyList,
    locator: HashMap<String, NodeId>,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Records a write of `key`: any existing node is dropped and a fresh one
    /// is pushed to the front.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        let id = self.order.push_front(key.to_string());
        self.locator.insert(key.to_string(), id);
    }

    // == Promote ==
    /// Moves an already-tracked key to the front.
    ///
    /// Returns false when the key is not tracked.
    pub fn promote(&mut self, key: &str) -> bool {
        match self.locator.get(key) {
            Some(&id) => self.order.move_to_front(id),
            None => false,
        }
    }

    // == Remove ==
    /// Removes a key from the tracker. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.locator.remove(key) {
            Some(id) => {
                self.order.remove(id);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let key = self.order.pop_back()?;
        self.locator.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order.back()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        debug_assert_eq!(
            self.order.len(),
            self.locator.len(),
            "recency list and key locator out of sync"
        );
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.locator.contains_key(key)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter()
    }
}
