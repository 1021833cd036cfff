//! Stop-Byte Dispatch
//!
//! The HTML engine copies bytes through untouched until it meets a byte that
//! can end the current token. This module holds that "what ends the token"
//! state:
//! - O(1) per byte
//! - No allocation
//! - A wildcard state that dispatches on every byte

/// Bytes that end the current token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// Dispatch on this one byte
    Byte(u8),
    /// Dispatch on either byte
    Either(u8, u8),
    /// Dispatch on every byte
    Any,
    /// Dispatch on every byte while the tag name may still turn out to be
    /// `!--`. Holds the next byte of that sequence.
    Comment(u8),
}

impl Stop {
    /// Stop state at the start of a document and after every mode change
    pub const TEXT: Stop = Stop::Byte(b'<');

    /// Check whether `byte` is a dispatch point
    #[inline]
    pub fn matches(self, byte: u8) -> bool {
        match self {
            Stop::Byte(a) => byte == a,
            Stop::Either(a, b) => byte == a || byte == b,
            Stop::Any | Stop::Comment(_) => true,
        }
    }
}
