//! Bounded buffer of identifiers awaiting an update lookup.
//!
//! Oplog update entries may carry only a diff, so the strategy remembers the
//! identifier and later fetches the whole current document. Identifiers are
//! kept in first-seen order and deduplicated. A delete for a buffered
//! identifier removes it, so a stale lookup can never follow a tombstone.

use bson::Bson;
use mongodb_types::identity_key;
use std::collections::HashSet;

/// Insertion-ordered set of document identifiers with a fixed capacity.
#[derive(Debug, Clone)]
pub struct UpdateBuffer {
    ids: Vec<Bson>,
    keys: HashSet<String>,
    capacity: usize,
}

impl UpdateBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: Vec::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Identity of an `_id` value. Equal numbers of any width are the same
    /// document; `Int32(1)` and `String("1")` are not.
    pub fn key(id: &Bson) -> String {
        identity_key(id)
    }

    /// Add an identifier. Returns false if it was already buffered.
    pub fn insert(&mut self, id: Bson) -> bool {
        if !self.keys.insert(Self::key(&id)) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Drop an identifier. Returns true if it was buffered.
    pub fn remove(&mut self, id: &Bson) -> bool {
        let key = Self::key(id);
        if !self.keys.remove(&key) {
            return false;
        }
        self.ids.retain(|buffered| Self::key(buffered) != key);
        true
    }

    pub fn contains(&self, id: &Bson) -> bool {
        self.keys.contains(&Self::key(id))
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered identifiers in first-seen order.
    pub fn ids(&self) -> &[Bson] {
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_position() {
        let mut buffer = UpdateBuffer::new(10);
        assert!(buffer.insert(Bson::Int32(2)));
        assert!(buffer.insert(Bson::Int32(1)));
        assert!(!buffer.insert(Bson::Int32(2)));
        assert_eq!(buffer.ids(), &[Bson::Int32(2), Bson::Int32(1)]);
    }

    #[test]
    fn test_remove_and_types_are_distinct() {
        let mut buffer = UpdateBuffer::new(10);
        buffer.insert(Bson::Int32(1));
        buffer.insert(Bson::String("1".into()));
        assert!(buffer.remove(&Bson::Int32(1)));
        assert!(!buffer.remove(&Bson::Int32(1)));
        assert!(buffer.contains(&Bson::String("1".into())));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_numeric_widths_name_one_document() {
        let mut buffer = UpdateBuffer::new(10);
        assert!(buffer.insert(Bson::Int32(1)));
        assert!(!buffer.insert(Bson::Int64(1)));
        assert!(!buffer.insert(Bson::Double(1.0)));
        assert!(buffer.contains(&Bson::Int64(1)));
        assert!(buffer.remove(&Bson::Double(1.0)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capacity() {
        let mut buffer = UpdateBuffer::new(2);
        buffer.insert(Bson::Int64(1));
        assert!(!buffer.is_full());
        buffer.insert(Bson::Int64(2));
        assert!(buffer.is_full());
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(UpdateBuffer::new(0).capacity(), 1);
    }
}
