//! Telemetry message filtering
//!
//! Turns a candidate document from the framer into a map of tag address to
//! raw motion flag. Only the proximity-tag telemetry message is recognized:
//!
//! ```json
//! {"message-type": 3070, "entries": [
//!     {"kind": "bxp-tag", "address": "AA:BB", "motion-flag": 1}
//! ]}
//! ```
//!
//! Whole-document problems reject the document; problems with a single entry
//! only drop that entry.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Message type of the proximity-tag telemetry report
pub const TELEMETRY_MESSAGE_TYPE: i64 = 3070;

/// Entry kind carrying a proximity tag
pub const PROXIMITY_TAG_KIND: &str = "bxp-tag";

const FIELD_MESSAGE_TYPE: &str = "message-type";
const FIELD_ENTRIES: &str = "entries";
const FIELD_KIND: &str = "kind";
const FIELD_ADDRESS: &str = "address";
const FIELD_MOTION_FLAG: &str = "motion-flag";

/// Tag address → raw motion flag for one document
pub type MotionFlags = HashMap<String, bool>;

/// Document-level decode failures
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not valid JSON
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Top level is not an object
    #[error("Document is not a JSON object")]
    NotAnObject,

    /// Required top-level field absent or of the wrong type
    #[error("Missing or invalid field '{0}'")]
    MissingField(&'static str),

    /// Some other message type
    #[error("Unsupported message type {0}")]
    UnsupportedMessageType(Value),
}

/// Decode a candidate document into motion flags
pub fn decode(document: &str) -> Result<MotionFlags, DecodeError> {
    let value: Value = serde_json::from_str(document)?;
    let root = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let message_type = root
        .get(FIELD_MESSAGE_TYPE)
        .filter(|v| v.is_number())
        .ok_or(DecodeError::MissingField(FIELD_MESSAGE_TYPE))?;
    let entries = root
        .get(FIELD_ENTRIES)
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingField(FIELD_ENTRIES))?;

    if message_type.as_i64() != Some(TELEMETRY_MESSAGE_TYPE) {
        return Err(DecodeError::UnsupportedMessageType(message_type.clone()));
    }

    let mut flags = MotionFlags::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            debug!("Entry {} is not an object, skipping", index);
            continue;
        };

        if entry.get(FIELD_KIND).and_then(Value::as_str) != Some(PROXIMITY_TAG_KIND) {
            trace!("Entry {} is not a proximity tag, skipping", index);
            continue;
        }

        match tag_fields(entry) {
            Some((address, moving)) => {
                flags.insert(address.to_string(), moving);
            }
            None => {
                debug!("Entry {} has no usable address or motion flag, skipping", index);
            }
        }
    }

    Ok(flags)
}

/// Decode a candidate document, logging and discarding failures
///
/// Never fails: a rejected document yields an empty map.
pub fn extract_motion_flags(document: &str) -> MotionFlags {
    match decode(document) {
        Ok(flags) => flags,
        Err(DecodeError::Malformed(e)) => {
            warn!("Received malformed JSON ({}): {}", e, document);
            MotionFlags::new()
        }
        Err(e) => {
            debug!("Discarding document: {}", e);
            MotionFlags::new()
        }
    }
}

fn tag_fields(entry: &Map<String, Value>) -> Option<(&str, bool)> {
    let address = entry.get(FIELD_ADDRESS)?.as_str()?;
    let moving = match entry.get(FIELD_MOTION_FLAG)? {
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_u64()? {
            0 => false,
            1 => true,
            _ => return None,
        },
        _ => return None,
    };
    Some((address, moving))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_entry() {
        let doc = r#"{"message-type":3070,"entries":[{"kind":"bxp-tag","address":"AA:BB","motion-flag":1}]}"#;
        let flags = decode(doc).unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags.get("AA:BB"), Some(&true));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let doc = r#"{"message-type":3070,"seq":9,"entries":[{"kind":"bxp-tag","address":"AA:BB","motion-flag":0,"rssi":-61,"battery":3000}]}"#;
        assert_eq!(decode(doc).unwrap().get("AA:BB"), Some(&false));
    }

    #[test]
    fn test_missing_entries_rejected() {
        let doc = r#"{"message-type":3070}"#;
        assert!(matches!(decode(doc), Err(DecodeError::MissingField("entries"))));
        assert!(extract_motion_flags(doc).is_empty());
    }

    #[test]
    fn test_non_numeric_message_type_rejected() {
        let doc = r#"{"message-type":"3070","entries":[]}"#;
        assert!(matches!(decode(doc), Err(DecodeError::MissingField("message-type"))));
    }

    #[test]
    fn test_other_message_type_rejected() {
        let doc = r#"{"message-type":1040,"entries":[{"kind":"bxp-tag","address":"AA:BB","motion-flag":1}]}"#;
        assert!(matches!(decode(doc), Err(DecodeError::UnsupportedMessageType(_))));
        assert!(extract_motion_flags(doc).is_empty());
    }

    #[test]
    fn test_malformed_json_is_total() {
        for doc in ["", "{", r#"{"message-type":3070,"entries":[}"#, "[1,2]", "null"] {
            assert!(extract_motion_flags(doc).is_empty(), "input {:?}", doc);
        }
    }

    #[test]
    fn test_bad_entries_skipped_individually() {
        let doc = r#"{"message-type":3070,"entries":[
            {"kind":"bxp-tag","address":"AA:01","motion-flag":1},
            {"kind":"bxp-tag","motion-flag":1},
            {"kind":"bxp-tag","address":"AA:03"},
            {"kind":"ibeacon","address":"AA:04","motion-flag":1},
            {"address":"AA:05","motion-flag":1},
            {"kind":"bxp-tag","address":"AA:06","motion-flag":7},
            42,
            {"kind":"bxp-tag","address":"AA:08","motion-flag":false}
        ]}"#;
        let flags = decode(doc).unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags.get("AA:01"), Some(&true));
        assert_eq!(flags.get("AA:08"), Some(&false));
    }

    #[test]
    fn test_last_entry_wins() {
        let doc = r#"{"message-type":3070,"entries":[
            {"kind":"bxp-tag","address":"AA:BB","motion-flag":1},
            {"kind":"bxp-tag","address":"AA:BB","motion-flag":0}
        ]}"#;
        assert_eq!(decode(doc).unwrap().get("AA:BB"), Some(&false));
    }

    #[test]
    fn test_addresses_are_case_sensitive() {
        let doc = r#"{"message-type":3070,"entries":[
            {"kind":"bxp-tag","address":"aa:bb","motion-flag":1},
            {"kind":"bxp-tag","address":"AA:BB","motion-flag":0}
        ]}"#;
        let flags = decode(doc).unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags.get("aa:bb"), Some(&true));
    }
}
