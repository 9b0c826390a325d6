//! Byte-sortable composite keys.
//!
//! Key format (one entry per segment):
//! ```text
//! ┌─────┬──────────────────────────────┐
//! │ tag │ body                         │
//! ├─────┼──────────────────────────────┤
//! │ 0x00│ varuint len + UTF-8 bytes    │  string
//! │ 0x01│ u32 big-endian (4 bytes)     │  integer
//! └─────┴──────────────────────────────┘
//! ```
//!
//! Integers are fixed-width big-endian so that a bytewise comparison of two
//! keys sharing a prefix orders their trailing clocks numerically. Range scans
//! over a document's update log depend on this.
//!
//! Keyspace layout:
//! - `("v1_sv", doc)`                 — state vector record, one per document
//! - `("v1", doc, "update", clock)`   — update log
//! - `("v1", doc, "meta", key)`       — metadata

use std::fmt;

use crate::error::KeyError;

const TAG_STRING: u8 = 0;
const TAG_U32: u8 = 1;

/// Namespace of the update log and metadata.
pub const NS_DOCUMENTS: &str = "v1";
/// Namespace of the per-document state vector records.
pub const NS_STATE_VECTORS: &str = "v1_sv";

const SUB_UPDATE: &str = "update";
const SUB_META: &str = "meta";
/// Sorts directly after `"meta"`, bounding the meta sub-range.
const SUB_META_END: &str = "metb";

/// One component of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Str(String),
    U32(u32),
}

impl KeySegment {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeySegment::Str(s) => Some(s),
            KeySegment::U32(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            KeySegment::U32(n) => Some(*n),
            KeySegment::Str(_) => None,
        }
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Str(s) => write!(f, "{s:?}"),
            KeySegment::U32(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        KeySegment::Str(s.to_owned())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        KeySegment::Str(s)
    }
}

impl From<u32> for KeySegment {
    fn from(n: u32) -> Self {
        KeySegment::U32(n)
    }
}

impl TryFrom<u64> for KeySegment {
    type Error = KeyError;

    fn try_from(n: u64) -> Result<Self, KeyError> {
        u32::try_from(n)
            .map(KeySegment::U32)
            .map_err(|_| KeyError::OutOfRange(n as i128))
    }
}

impl TryFrom<i64> for KeySegment {
    type Error = KeyError;

    fn try_from(n: i64) -> Result<Self, KeyError> {
        u32::try_from(n)
            .map(KeySegment::U32)
            .map_err(|_| KeyError::OutOfRange(n as i128))
    }
}

impl TryFrom<usize> for KeySegment {
    type Error = KeyError;

    fn try_from(n: usize) -> Result<Self, KeyError> {
        u32::try_from(n)
            .map(KeySegment::U32)
            .map_err(|_| KeyError::OutOfRange(n as i128))
    }
}

/// Encode a segment sequence.
pub fn encode(segments: &[KeySegment]) -> Vec<u8> {
    let mut out = Vec::with_capacity(segments.len() * 8);
    for segment in segments {
        match segment {
            KeySegment::Str(s) => {
                out.push(TAG_STRING);
                write_var_uint(&mut out, s.len() as u64);
                out.extend_from_slice(s.as_bytes());
            }
            KeySegment::U32(n) => {
                out.push(TAG_U32);
                out.extend_from_slice(&n.to_be_bytes());
            }
        }
    }
    out
}

/// Decode a key produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Vec<KeySegment>, KeyError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let tag = bytes[pos];
        pos += 1;
        match tag {
            TAG_STRING => {
                let (len, read) = read_var_uint(&bytes[pos..]).ok_or(KeyError::Truncated(pos))?;
                pos += read;
                let len = usize::try_from(len).map_err(|_| KeyError::Truncated(pos))?;
                let end = pos.checked_add(len).ok_or(KeyError::Truncated(pos))?;
                let raw = bytes.get(pos..end).ok_or(KeyError::Truncated(pos))?;
                let s = std::str::from_utf8(raw).map_err(|_| KeyError::InvalidUtf8)?;
                segments.push(KeySegment::Str(s.to_owned()));
                pos = end;
            }
            TAG_U32 => {
                let raw: [u8; 4] = bytes
                    .get(pos..pos + 4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(KeyError::Truncated(pos))?;
                segments.push(KeySegment::U32(u32::from_be_bytes(raw)));
                pos += 4;
            }
            other => return Err(KeyError::UnknownTag { tag: other, offset: pos - 1 }),
        }
    }
    Ok(segments)
}

/// Exclusive upper bound of every key that starts with `prefix`.
///
/// Each segment begins with a tag byte below `0xFF`, so appending `0xFF`
/// sorts after all extensions of the prefix.
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = Vec::with_capacity(prefix.len() + 1);
    end.extend_from_slice(prefix);
    end.push(0xFF);
    end
}

fn write_var_uint(out: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        out.push((n as u8 & 0x7F) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

fn read_var_uint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

// ─── Key builders ─────────────────────────────────────────────────────

pub fn update_key(doc: &str, clock: u32) -> Vec<u8> {
    encode(&[NS_DOCUMENTS.into(), doc.into(), SUB_UPDATE.into(), clock.into()])
}

/// `[start, end)` covering every update key of `doc`, `u32::MAX` included.
pub fn update_range(doc: &str) -> (Vec<u8>, Vec<u8>) {
    let prefix = encode(&[NS_DOCUMENTS.into(), doc.into(), SUB_UPDATE.into()]);
    (update_key(doc, 0), prefix_end(&prefix))
}

pub fn meta_key(doc: &str, meta: &str) -> Vec<u8> {
    encode(&[NS_DOCUMENTS.into(), doc.into(), SUB_META.into(), meta.into()])
}

/// `[start, end)` covering every meta key of `doc`.
pub fn meta_range(doc: &str) -> (Vec<u8>, Vec<u8>) {
    (
        meta_key(doc, ""),
        encode(&[NS_DOCUMENTS.into(), doc.into(), SUB_META_END.into()]),
    )
}

pub fn state_vector_key(doc: &str) -> Vec<u8> {
    encode(&[NS_STATE_VECTORS.into(), doc.into()])
}

/// `[start, end)` covering a whole top-level namespace.
pub fn namespace_range(namespace: &str) -> (Vec<u8>, Vec<u8>) {
    let start = encode(&[namespace.into()]);
    let end = prefix_end(&start);
    (start, end)
}

/// Recover the document name from a state vector key.
pub fn doc_name_from_state_vector_key(key: &[u8]) -> Result<Option<String>, KeyError> {
    let mut segments = decode(key)?.into_iter();
    match (segments.next(), segments.next(), segments.next()) {
        (Some(KeySegment::Str(ns)), Some(KeySegment::Str(doc)), None) if ns == NS_STATE_VECTORS => {
            Ok(Some(doc))
        }
        _ => Ok(None),
    }
}

/// Recover the clock from an update key.
pub fn clock_from_update_key(key: &[u8]) -> Result<Option<u32>, KeyError> {
    Ok(decode(key)?.get(3).and_then(KeySegment::as_u32))
}

/// Recover the meta key name from a meta key.
pub fn meta_name_from_key(key: &[u8]) -> Result<Option<String>, KeyError> {
    Ok(decode(key)?.get(3).and_then(KeySegment::as_str).map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(doc: &str, n: u32) -> Vec<KeySegment> {
        vec!["v1".into(), doc.into(), "update".into(), n.into()]
    }

    #[test]
    fn test_roundtrip_mixed_segments() {
        let cases = vec![
            vec![],
            vec!["".into()],
            vec![KeySegment::U32(0), KeySegment::U32(u32::MAX)],
            vec!["v1".into(), "héllo wörld".into(), "meta".into(), "author".into()],
            seq("doc", 42),
            vec![KeySegment::Str("x".repeat(300))],
        ];
        for segments in cases {
            assert_eq!(decode(&encode(&segments)).unwrap(), segments);
        }
    }

    #[test]
    fn test_integer_order_matches_byte_order() {
        let samples = [0u32, 1, 2, 127, 128, 255, 256, 65_535, 65_536, 1 << 24, u32::MAX - 1, u32::MAX];
        for &a in &samples {
            for &b in &samples {
                let ka = encode(&seq("d", a));
                let kb = encode(&seq("d", b));
                assert_eq!(ka.cmp(&kb), a.cmp(&b), "a={a} b={b}");
            }
        }
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let err = decode(&[7, 1, 2]).unwrap_err();
        assert_eq!(err, KeyError::UnknownTag { tag: 7, offset: 0 });
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let mut key = encode(&["abc".into()]);
        key.pop();
        assert!(matches!(decode(&key), Err(KeyError::Truncated(_))));

        assert!(matches!(decode(&[TAG_U32, 0, 0]), Err(KeyError::Truncated(_))));
    }

    #[test]
    fn test_out_of_range_integer_segment() {
        assert_eq!(
            KeySegment::try_from(u64::from(u32::MAX) + 1),
            Err(KeyError::OutOfRange(1 << 32))
        );
        assert_eq!(KeySegment::try_from(-1i64), Err(KeyError::OutOfRange(-1)));
        assert_eq!(KeySegment::try_from(7usize), Ok(KeySegment::U32(7)));
    }

    #[test]
    fn test_meta_range_contains_only_meta_keys() {
        let (start, end) = meta_range("doc");
        let meta = meta_key("doc", "title");
        assert!(start <= meta && meta < end);
        assert!(meta_key("doc", "") >= start);

        let update = update_key("doc", 0);
        assert!(!(start <= update && update < end));
        let other = meta_key("doc2", "title");
        assert!(!(start <= other && other < end));
    }

    #[test]
    fn test_update_range_bounds() {
        let (start, end) = update_range("doc");
        for clock in [0, 1, 500, u32::MAX] {
            let key = update_key("doc", clock);
            assert!(start <= key && key < end);
        }
        let meta = meta_key("doc", "a");
        assert!(!(start <= meta && meta < end));
        let sibling = update_key("doc2", 0);
        assert!(!(start <= sibling && sibling < end));
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        let (sv_start, sv_end) = namespace_range(NS_STATE_VECTORS);
        let (doc_start, doc_end) = namespace_range(NS_DOCUMENTS);

        let sv = state_vector_key("a");
        assert!(sv_start <= sv && sv < sv_end);
        assert!(!(doc_start <= sv && sv < doc_end));

        let update = update_key("a", u32::MAX);
        assert!(doc_start <= update && update < doc_end);
        assert!(!(sv_start <= update && update < sv_end));
    }

    #[test]
    fn test_doc_name_recovery() {
        let key = state_vector_key("my doc");
        assert_eq!(doc_name_from_state_vector_key(&key).unwrap(), Some("my doc".into()));
        assert_eq!(doc_name_from_state_vector_key(&update_key("x", 1)).unwrap(), None);
        assert_eq!(clock_from_update_key(&update_key("x", 9)).unwrap(), Some(9));
        assert_eq!(meta_name_from_key(&meta_key("x", "k")).unwrap(), Some("k".into()));
    }
}
