//! Value-schema compression codec.
//!
//! Encoding drops field names (schema positions carry identity), serializes
//! the ordered values densely, then gzips the result. Decoding reverses
//! exactly. Both directions are pure; retry and drop policy belong to the
//! caller.

pub mod schema;

use crate::domain::TelemetryRecord;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

pub use schema::{FIELD_COUNT, SCHEMA_VERSION};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::error::EncodeError),
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] bincode::error::DecodeError),
    #[error("Unsupported payload version: {version}")]
    UnsupportedVersion { version: u8 },
    #[error("Expected a single record, payload holds {count}")]
    UnexpectedRecordCount { count: usize },
}

/// On-the-wire body: version tag plus schema-ordered value rows.
#[derive(Serialize, Deserialize)]
struct PayloadBody {
    version: u8,
    rows: Vec<Vec<Option<String>>>,
}

/// Stateless encoder/decoder; carries only the gzip level.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryCodec {
    compression: Compression,
}

impl Default for TelemetryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryCodec {
    pub fn new() -> Self {
        Self {
            compression: Compression::default(),
        }
    }

    pub fn with_compression(compression: Compression) -> Self {
        Self { compression }
    }

    pub fn encode_one(&self, record: &TelemetryRecord) -> Result<Vec<u8>, CodecError> {
        self.encode_rows(vec![schema::project(record)])
    }

    pub fn decode_one(&self, bytes: &[u8]) -> Result<TelemetryRecord, CodecError> {
        let mut records = self.decode_many(bytes)?;
        if records.len() != 1 {
            return Err(CodecError::UnexpectedRecordCount {
                count: records.len(),
            });
        }
        Ok(records.remove(0))
    }

    pub fn encode_many(&self, records: &[TelemetryRecord]) -> Result<Vec<u8>, CodecError> {
        self.encode_rows(records.iter().map(schema::project).collect())
    }

    pub fn decode_many(&self, bytes: &[u8]) -> Result<Vec<TelemetryRecord>, CodecError> {
        let raw = decompress(bytes)?;
        let (body, _): (PayloadBody, usize) =
            bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
        if body.version != SCHEMA_VERSION {
            return Err(CodecError::UnsupportedVersion {
                version: body.version,
            });
        }
        Ok(body.rows.into_iter().map(schema::reassemble).collect())
    }

    fn encode_rows(&self, rows: Vec<Vec<Option<String>>>) -> Result<Vec<u8>, CodecError> {
        let body = PayloadBody {
            version: SCHEMA_VERSION,
            rows,
        };
        let serialized = bincode::serde::encode_to_vec(&body, bincode::config::standard())?;

        let mut encoder = GzEncoder::new(Vec::new(), self.compression);
        encoder.write_all(&serialized)?;
        Ok(encoder.finish()?)
    }
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}
