//! Anonymization of raw event details
//!
//! Raw details arrive as arbitrary JSON. Only a fixed whitelist of fields is
//! carried forward, and identifying fields are masked or hashed on the way.
//! Nothing here can fail: malformed input degrades to a placeholder.

use crate::models::MaskedDetails;
use serde_json::{Map, Number, Value};
use std::net::Ipv4Addr;

/// Replacement for the last octet of a well-formed IPv4 address
pub const OCTET_PLACEHOLDER: &str = "xxx";

/// Replacement for an address that could not be parsed
pub const MASKED_PLACEHOLDER: &str = "masked";

const USERNAME_HASH_MODULUS: u64 = 1_000_000;

/// Mask the raw event details
///
/// Anything that is not a JSON object is treated as empty details.
pub fn anonymize(raw: Option<&Value>) -> MaskedDetails {
    match raw {
        Some(Value::Object(fields)) => anonymize_fields(fields),
        _ => MaskedDetails::default(),
    }
}

fn anonymize_fields(fields: &Map<String, Value>) -> MaskedDetails {
    MaskedDetails {
        src_ip_masked: fields.get("src_ip").map(mask_ip),
        username_hash: fields.get("username").map(hash_username),
        attempts: fields.get("attempts").and_then(numeric),
        dst_port: fields.get("dst_port").and_then(numeric),
        ports_scanned: fields.get("ports_scanned").and_then(numeric),
    }
}

/// Replace the last octet of a dotted-quad address
///
/// Returns [`MASKED_PLACEHOLDER`] for anything that is not a well-formed
/// IPv4 address.
pub fn mask_ip(value: &Value) -> String {
    match value.as_str().and_then(|s| s.trim().parse::<Ipv4Addr>().ok()) {
        Some(addr) => {
            let [a, b, c, _] = addr.octets();
            format!("{}.{}.{}.{}", a, b, c, OCTET_PLACEHOLDER)
        }
        None => MASKED_PLACEHOLDER.to_string(),
    }
}

/// Deterministic short numeric hash of a username
///
/// FNV-1a reduced to six digits. Stable across runs and platforms, and
/// deliberately not a cryptographic hash.
pub fn hash_username(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (fnv1a(text.as_bytes()) % USERNAME_HASH_MODULUS).to_string()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

fn numeric(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}
