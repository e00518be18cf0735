//! Composite PIT identifier codec.
//!
//! Wire layout before base64url encoding:
//!
//! ```text
//! +-------+---------+------------------+--------------------------------+
//! | "PIT" | version | FNV-1a checksum  | MessagePack list of references |
//! | 3 B   | 1 B     | 8 B little-endian| n B                            |
//! +-------+---------+------------------+--------------------------------+
//! ```
//!
//! Decoding is all-or-nothing: any structural defect rejects the whole token
//! with [`PitError::InvalidId`] and no reference is returned.

use crate::core::{PitError, Result, ShardReference};
use serde::{Deserialize, Serialize};

const PIT_ID_MAGIC: &[u8; 3] = b"PIT";
const PIT_ID_VERSION: u8 = 1;
const HEADER_LEN: usize = PIT_ID_MAGIC.len() + 1 + 8;

#[derive(Serialize, Deserialize)]
struct PitIdPayload {
    references: Vec<ShardReference>,
}

/// Encodes shard references into an opaque, URL-safe PIT id.
pub fn encode_pit_id(references: &[ShardReference]) -> Result<String> {
    if references.is_empty() {
        return Err(PitError::ExecutionError(
            "a PIT id must reference at least one shard".to_string(),
        ));
    }
    let payload = rmp_serde::to_vec(&PitIdPayload {
        references: references.to_vec(),
    })
    .map_err(|err| PitError::Serialization(err.to_string()))?;

    let mut raw = Vec::with_capacity(HEADER_LEN + payload.len());
    raw.extend_from_slice(PIT_ID_MAGIC);
    raw.push(PIT_ID_VERSION);
    raw.extend_from_slice(&fnv1a64(&payload).to_le_bytes());
    raw.extend_from_slice(&payload);
    Ok(encode_base64url(&raw))
}

/// Decodes a PIT id into its shard references. Pure; never touches node state.
pub fn decode_pit_id(id: &str) -> Result<Vec<ShardReference>> {
    let raw = decode_base64url(id.trim()).ok_or_else(|| invalid("not base64url"))?;
    if raw.len() <= HEADER_LEN {
        return Err(invalid("token too short"));
    }
    if &raw[..3] != PIT_ID_MAGIC {
        return Err(invalid("missing format marker"));
    }
    if raw[3] != PIT_ID_VERSION {
        return Err(invalid(&format!("unsupported version {}", raw[3])));
    }

    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&raw[4..HEADER_LEN]);
    let payload = &raw[HEADER_LEN..];
    if u64::from_le_bytes(checksum) != fnv1a64(payload) {
        return Err(invalid("checksum mismatch"));
    }

    let decoded: PitIdPayload =
        rmp_serde::from_slice(payload).map_err(|_| invalid("malformed shard references"))?;
    if decoded.references.is_empty() {
        return Err(invalid("no shard references"));
    }
    if decoded
        .references
        .iter()
        .any(|reference| reference.node_id.trim().is_empty())
    {
        return Err(invalid("unknown node reference"));
    }
    Ok(decoded.references)
}

fn invalid(reason: &str) -> PitError {
    PitError::InvalidId(reason.to_string())
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 14695981039346656037u64;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

fn decode_base64url(input: &str) -> Option<Vec<u8>> {
    if input.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity((input.len() * 3) / 4);
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;

    for byte in input.bytes() {
        let value: u8 = match byte {
            b'A'..=b'Z' => byte - b'A',
            b'a'..=b'z' => byte - b'a' + 26,
            b'0'..=b'9' => byte - b'0' + 52,
            b'-' => 62,
            b'_' => 63,
            _ => return None,
        };
        acc = (acc << 6) | u32::from(value);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xFF) as u8);
        }
    }

    if bits >= 6 {
        return None;
    }
    if bits > 0 {
        let mask = (1u32 << bits) - 1;
        if (acc & mask) != 0 {
            return None;
        }
    }
    Some(out)
}

fn encode_base64url(input: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut out = String::with_capacity((input.len() * 4).div_ceil(3));
    let mut i = 0usize;
    while i + 3 <= input.len() {
        let chunk = ((input[i] as u32) << 16) | ((input[i + 1] as u32) << 8) | input[i + 2] as u32;
        out.push(ALPHABET[((chunk >> 18) & 0x3F) as usize] as char);
        out.push(ALPHABET[((chunk >> 12) & 0x3F) as usize] as char);
        out.push(ALPHABET[((chunk >> 6) & 0x3F) as usize] as char);
        out.push(ALPHABET[(chunk & 0x3F) as usize] as char);
        i += 3;
    }

    let remaining = input.len() - i;
    if remaining == 1 {
        let chunk = (input[i] as u32) << 16;
        out.push(ALPHABET[((chunk >> 18) & 0x3F) as usize] as char);
        out.push(ALPHABET[((chunk >> 12) & 0x3F) as usize] as char);
    } else if remaining == 2 {
        let chunk = ((input[i] as u32) << 16) | ((input[i + 1] as u32) << 8);
        out.push(ALPHABET[((chunk >> 18) & 0x3F) as usize] as char);
        out.push(ALPHABET[((chunk >> 12) & 0x3F) as usize] as char);
        out.push(ALPHABET[((chunk >> 6) & 0x3F) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContextToken, ShardId};

    fn references() -> Vec<ShardReference> {
        vec![
            ShardReference::new(
                "node-a",
                ShardId::new("index", 0),
                ContextToken::new("session-a", 1),
            ),
            ShardReference::new(
                "node-b",
                ShardId::new("index", 1),
                ContextToken::new("session-b", 7),
            ),
        ]
    }

    #[test]
    fn decodes_what_it_encodes_in_order() {
        let id = encode_pit_id(&references()).unwrap();
        assert!(id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        assert_eq!(decode_pit_id(&id).unwrap(), references());
    }

    #[test]
    fn rejects_non_decodable_strings() {
        for bad in ["nondecodableid", "", "not a real id", "!!!!", "UElU"] {
            let err = decode_pit_id(bad).unwrap_err();
            assert!(err.to_string().contains("invalid id"), "{bad}: {err}");
        }
    }

    #[test]
    fn rejects_tampered_payload() {
        let id = encode_pit_id(&references()).unwrap();
        let mut raw = decode_base64url(&id).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = encode_base64url(&raw);
        assert!(matches!(
            decode_pit_id(&tampered),
            Err(PitError::InvalidId(reason)) if reason == "checksum mismatch"
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let id = encode_pit_id(&references()).unwrap();
        let mut raw = decode_base64url(&id).unwrap();
        raw[3] = 9;
        assert!(decode_pit_id(&encode_base64url(&raw)).is_err());
    }

    #[test]
    fn refuses_to_encode_empty_reference_list() {
        assert!(encode_pit_id(&[]).is_err());
    }
}
