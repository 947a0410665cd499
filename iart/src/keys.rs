//! Stored key encoding.
//!
//! User keys are wrapped before they enter the tree: a leading marker byte, then the key body
//! with every `0x00` escaped as `0x00 0xFF`, then a `0x00 0x00` terminator. The encoding keeps
//! lexicographic order intact and guarantees no stored key is a prefix of another, even when the
//! user's keys are prefixes of each other (`"foo"` and `"foobar"`).

use std::fmt;

/// Leading marker carried by every stored key.
pub const KEY_HEAD: u8 = 0x01;

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;

/// Trailing terminator carried by every stored key.
pub const TERMINATOR: [u8; 2] = [0x00, 0x00];

/// A user key in its stored, sentinel-wrapped form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoredKey {
    data: Box<[u8]>,
}

impl StoredKey {
    pub fn new_from_slice(raw: &[u8]) -> Self {
        let mut data = encode_body(raw);
        data.extend_from_slice(&TERMINATOR);
        Self {
            data: data.into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub fn at(&self, pos: usize) -> u8 {
        self.data[pos]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The encoded key without its terminator. A stored key is a raw prefix of another raw key
    /// exactly when its body is a byte prefix of the other key's body.
    pub fn body(&self) -> &[u8] {
        &self.data[..self.data.len() - TERMINATOR.len()]
    }

    /// Recover the key as the user supplied it.
    pub fn to_user_key(&self) -> Vec<u8> {
        decode_body(self.body())
    }
}

impl From<&[u8]> for StoredKey {
    fn from(raw: &[u8]) -> Self {
        Self::new_from_slice(raw)
    }
}

impl From<&str> for StoredKey {
    fn from(raw: &str) -> Self {
        Self::new_from_slice(raw.as_bytes())
    }
}

impl fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoredKey({:?})", String::from_utf8_lossy(&self.to_user_key()))
    }
}

/// Encode `raw` as a stored key body: marker byte plus escaped bytes, no terminator.
pub(crate) fn encode_body(raw: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(raw.len() + 1 + TERMINATOR.len());
    data.push(KEY_HEAD);
    for &b in raw {
        data.push(b);
        if b == ESCAPE {
            data.push(ESCAPED_NUL);
        }
    }
    data
}

pub(crate) fn decode_body(body: &[u8]) -> Vec<u8> {
    debug_assert_eq!(body.first(), Some(&KEY_HEAD));
    let mut out = Vec::with_capacity(body.len().saturating_sub(1));
    let mut bytes = body.iter().skip(1);
    while let Some(&b) = bytes.next() {
        out.push(b);
        if b == ESCAPE {
            bytes.next();
        }
    }
    out
}

/// Offsets into an encoded body at which some raw prefix of the key ends, shortest first.
/// Offset 1 is the empty key; offsets that would split an escape pair are skipped.
pub(crate) fn prefix_boundaries(body: &[u8]) -> impl Iterator<Item = usize> + '_ {
    (1..=body.len()).filter(move |&p| body[p - 1] != ESCAPE)
}

/// Length of the common run of `a` and `b` starting at `depth`.
pub(crate) fn longest_common_prefix(a: &[u8], b: &[u8], depth: usize) -> usize {
    let max = a.len().min(b.len()).saturating_sub(depth);
    (0..max)
        .find(|&i| a[depth + i] != b[depth + i])
        .unwrap_or(max)
}
