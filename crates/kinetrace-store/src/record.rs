//! On-disk record framing for the container file.
//!
//! A container file is a fixed header followed by a sequence of frames:
//!
//! ```text
//! [ magic "KTRC" ][ u16 LE version ]
//! [ u32 LE payload length ][ bincode payload ] ...
//! ```
//!
//! Each payload is one [`Record`]. Replaying the records in order rebuilds
//! the catalog, the registry, and the four relations, including every
//! assigned id. Appending is a single frame write, which is what makes a
//! batch append all-or-nothing at the API level.
//!
//! A process crash can tear the final frame. [`read_log`] therefore treats a
//! malformed *tail* (short length prefix, short payload, undecodable final
//! payload, or a final `Rows` payload that is not whole rows) as an
//! uncommitted append: the tail is dropped and the valid prefix length is
//! reported so a read-write open can truncate before continuing. The same
//! damage anywhere before the tail is corruption and fails the open.

use serde::{Deserialize, Serialize};

use crate::registry::ObjectRecord;
use crate::series::RelationKind;
use crate::shape::ShapeDef;
use crate::StoreError;

/// File magic.
pub const MAGIC: [u8; 4] = *b"KTRC";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header length in bytes (magic + version).
pub const HEADER_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One durable container record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Record {
    /// A catalog entry: name, assigned id, definition digest, definition.
    Shape {
        name: String,
        id: u32,
        digest: [u8; 32],
        def: ShapeDef,
    },
    /// A registry entry with its assigned signed id.
    Object(ObjectRecord),
    /// One appended batch of rows for a relation, flat row-major in the
    /// relation's fixed column order.
    Rows {
        relation: RelationKind,
        data: Vec<f64>,
    },
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// The file header bytes.
pub fn header() -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    h[..4].copy_from_slice(&MAGIC);
    h[4..].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    h
}

/// Encode a record as one length-prefixed frame.
pub fn encode_frame(record: &Record) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serde::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| StoreError::Corrupt {
            details: format!("record failed to encode: {e}"),
        })?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// The outcome of scanning a container file body.
#[derive(Debug)]
pub struct LogContents {
    /// Every fully committed record, in write order.
    pub records: Vec<Record>,
    /// Byte length of the valid prefix (header included). Anything past it
    /// is a torn tail that a read-write open truncates away.
    pub valid_len: u64,
}

/// Scan a whole container file.
///
/// An empty file is a valid empty container (the header is written with the
/// first record). A non-empty file must start with the magic and a known
/// version.
pub fn read_log(bytes: &[u8]) -> Result<LogContents, StoreError> {
    if bytes.is_empty() {
        return Ok(LogContents {
            records: Vec::new(),
            valid_len: 0,
        });
    }
    if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
        return Err(StoreError::Corrupt {
            details: "missing container magic".to_owned(),
        });
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(StoreError::Corrupt {
            details: format!("unsupported format version {version}"),
        });
    }

    let mut records = Vec::new();
    let mut offset = HEADER_LEN;
    loop {
        let remaining = &bytes[offset..];
        if remaining.is_empty() {
            break;
        }
        if remaining.len() < 4 {
            // Torn length prefix: can only happen at the tail.
            tracing::warn!(
                trailing_bytes = remaining.len(),
                "dropping torn frame length prefix at container tail"
            );
            break;
        }
        let len = u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]])
            as usize;
        if remaining.len() < 4 + len {
            tracing::warn!(
                declared = len,
                available = remaining.len() - 4,
                "dropping torn frame payload at container tail"
            );
            break;
        }
        let payload = &remaining[4..4 + len];
        let is_tail = remaining.len() == 4 + len;
        match decode_record(payload) {
            Ok(record) => {
                records.push(record);
                offset += 4 + len;
            }
            Err(details) if is_tail => {
                tracing::warn!(%details, "dropping undecodable frame at container tail");
                break;
            }
            Err(details) => {
                return Err(StoreError::Corrupt { details });
            }
        }
    }

    // A final Rows batch that is not whole rows is a torn append as well.
    let ragged_tail = matches!(
        records.last(),
        Some(Record::Rows { relation, data }) if data.len() % relation.columns() != 0
    );
    if ragged_tail {
        if let Some(record) = records.pop() {
            if let Record::Rows { relation, data } = &record {
                tracing::warn!(
                    relation = relation.name(),
                    values = data.len(),
                    "dropping ragged row batch at container tail"
                );
            }
            offset -= encode_frame(&record)?.len();
        }
    }

    Ok(LogContents {
        records,
        valid_len: offset as u64,
    })
}

fn decode_record(payload: &[u8]) -> Result<Record, String> {
    match bincode::serde::decode_from_slice::<Record, _>(payload, bincode::config::standard()) {
        Ok((record, read)) if read == payload.len() => Ok(record),
        Ok((_, read)) => Err(format!(
            "frame payload has {} bytes of trailing garbage",
            payload.len() - read
        )),
        Err(e) => Err(format!("frame payload failed to decode: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
