//! Token Carryover Buffer
//!
//! CRITICAL: Tags and attribute names can split across chunk boundaries.
//! The engine withholds the bytes of an unfinished token from the output of
//! one chunk and splices them back in front of the next chunk, so the token
//! is seen whole when its terminator finally arrives.
//!
//! The buffer is allocated once at its full capacity. A token longer than
//! the capacity is truncated: the excess is lost and the token may fail to
//! match a rule.

use log::warn;

/// Holds the unfinished token of the previous chunk
pub struct Carryover {
    /// Withheld bytes (never longer than `capacity`)
    bytes: Vec<u8>,
    /// Maximum number of bytes to withhold
    capacity: usize,
}

impl Carryover {
    /// Create a carryover buffer. A capacity of 0 disables carryover.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether carryover is enabled at all
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Number of withheld bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Withhold `token`, replacing anything already held.
    /// Returns the number of bytes lost to truncation.
    pub fn store(&mut self, token: &[u8]) -> usize {
        let kept = token.len().min(self.capacity);
        self.bytes.clear();
        self.bytes.extend_from_slice(&token[..kept]);

        let dropped = token.len() - kept;
        if dropped > 0 {
            warn!(
                "Carryover truncated: token of {} bytes exceeds capacity {}, {} bytes dropped",
                token.len(),
                self.capacity,
                dropped
            );
        }
        dropped
    }

    /// Splice the withheld bytes in front of `buffer` and empty the carryover.
    /// Returns the number of bytes spliced in.
    pub fn prepend_to(&mut self, buffer: &mut Vec<u8>) -> usize {
        let len = self.bytes.len();
        if len > 0 {
            buffer.splice(0..0, self.bytes.drain(..));
        }
        len
    }

    /// Drop the withheld bytes. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let len = self.bytes.len();
        self.bytes.clear();
        len
    }
}

impl Default for Carryover {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_prepend() {
        let mut carry = Carryover::new(8);
        assert_eq!(carry.store(b"<scr"), 0);
        assert_eq!(carry.len(), 4);

        let mut next = b"ipt>".to_vec();
        assert_eq!(carry.prepend_to(&mut next), 4);
        assert_eq!(next, b"<script>");
        assert!(carry.is_empty());
    }

    #[test]
    fn test_truncates_to_capacity() {
        let mut carry = Carryover::new(3);
        assert_eq!(carry.store(b"<script"), 4);

        let mut next = b"ipt>".to_vec();
        carry.prepend_to(&mut next);
        assert_eq!(next, b"<scipt>");
    }

    #[test]
    fn test_store_replaces_previous() {
        let mut carry = Carryover::new(8);
        carry.store(b"<div");
        carry.store(b" id");

        let mut next = b"=".to_vec();
        carry.prepend_to(&mut next);
        assert_eq!(next, b" id=");
    }

    #[test]
    fn test_prepend_empty_is_noop() {
        let mut carry = Carryover::new(8);
        let mut next = b"hello".to_vec();
        assert_eq!(carry.prepend_to(&mut next), 0);
        assert_eq!(next, b"hello");
    }

    #[test]
    fn test_disabled() {
        let carry = Carryover::default();
        assert!(!carry.is_enabled());
        assert!(carry.is_empty());
    }

    #[test]
    fn test_clear_reports_dropped() {
        let mut carry = Carryover::new(8);
        carry.store(b"<ta");
        assert_eq!(carry.clear(), 3);
        assert_eq!(carry.len(), 0);
    }
}
