//! Compressed node prefixes.

use std::cmp::min;
use std::fmt;

/// Bytes of a compressed prefix stored inline in a node. Longer prefixes keep only their first
/// `MAX_PREFIX_LEN` bytes; the remainder is read back from a leaf beneath the node.
pub const MAX_PREFIX_LEN: usize = 10;

/// The compressed prefix of an inner node.
///
/// `len` is the logical prefix length and may exceed `MAX_PREFIX_LEN`.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefix {
    bytes: [u8; MAX_PREFIX_LEN],
    len: usize,
}

impl Prefix {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A prefix of `len` bytes taken from `key` starting at `depth`.
    pub fn from_key(key: &[u8], depth: usize, len: usize) -> Self {
        let mut bytes = [0; MAX_PREFIX_LEN];
        let stored = min(len, MAX_PREFIX_LEN);
        bytes[..stored].copy_from_slice(&key[depth..depth + stored]);
        Self { bytes, len }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when part of the prefix lives only in the leaves.
    #[inline(always)]
    pub fn is_overflowed(&self) -> bool {
        self.len > MAX_PREFIX_LEN
    }

    /// The inline portion.
    #[inline]
    pub fn inline(&self) -> &[u8] {
        &self.bytes[..min(self.len, MAX_PREFIX_LEN)]
    }

    /// Compare the inline portion against `key` at `depth`, returning the index of the first
    /// mismatch, or the number of bytes compared if they all match.
    pub fn check(&self, key: &[u8], depth: usize) -> usize {
        let max_cmp = min(
            min(self.len, MAX_PREFIX_LEN),
            key.len().saturating_sub(depth),
        );
        (0..max_cmp)
            .find(|&idx| self.bytes[idx] != key[depth + idx])
            .unwrap_or(max_cmp)
    }

    /// The prefix with its first `n` bytes removed. Only valid when the prefix is fully inline.
    pub fn trimmed(&self, n: usize) -> Self {
        debug_assert!(!self.is_overflowed());
        debug_assert!(n <= self.len);
        let rest = self.len - n;
        let mut bytes = [0; MAX_PREFIX_LEN];
        bytes[..rest].copy_from_slice(&self.bytes[n..self.len]);
        Self { bytes, len: rest }
    }

    /// `parent`, then the separator byte, then `child`, as one prefix. Used when a node with a
    /// single remaining child is folded into that child.
    pub fn joined(parent: &Prefix, separator: u8, child: &Prefix) -> Self {
        let mut bytes = parent.bytes;
        let mut filled = min(parent.len, MAX_PREFIX_LEN);
        if filled < MAX_PREFIX_LEN {
            bytes[filled] = separator;
            filled += 1;
        }
        if filled < MAX_PREFIX_LEN {
            let take = min(child.inline().len(), MAX_PREFIX_LEN - filled);
            bytes[filled..filled + take].copy_from_slice(&child.inline()[..take]);
        }
        Self {
            bytes,
            len: parent.len + 1 + child.len,
        }
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prefix")
            .field("inline", &self.inline())
            .field("len", &self.len)
            .finish()
    }
}
