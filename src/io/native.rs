//! Native `.bstr` container: a 32-byte little-endian header followed by a
//! postcard payload whose CRC32 is stored in the header.
//!
//! Header words, in order: magic, version (major, minor), model type, a
//! reserved byte, flags (u16), two reserved bytes, then the u32 payload
//! size, payload checksum, feature count and group count. The last four
//! bytes are reserved and written as zero.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::model::ModelError;

/// Magic bytes identifying a model file.
pub const MAGIC: &[u8; 4] = b"BSTR";

pub const CURRENT_VERSION_MAJOR: u8 = 1;
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

const FLAG_COMPRESSED: u16 = 1;

/// Offset of the first u32 word (payload size).
const WORDS_AT: usize = 12;

/// Kind of model stored in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelType {
    ForestClassifier = 0,
}

impl TryFrom<u8> for ModelType {
    type Error = DeserializeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ForestClassifier),
            other => Err(DeserializeError::CorruptPayload(format!(
                "unknown model type {other}"
            ))),
        }
    }
}

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub model_type: ModelType,
    /// Payload was written compressed. Such files are refused on read.
    pub compressed: bool,
    pub payload_size: u32,
    pub checksum: u32,
    pub num_features: u32,
    pub num_groups: u32,
}

impl FormatHeader {
    /// Header for an empty payload at the current version.
    pub fn new(model_type: ModelType, num_features: u32, num_groups: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            model_type,
            compressed: false,
            payload_size: 0,
            checksum: 0,
            num_features,
            num_groups,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6] = self.model_type as u8;

        let flags = if self.compressed { FLAG_COMPRESSED } else { 0 };
        buf[8..10].copy_from_slice(&flags.to_le_bytes());

        let words = [self.payload_size, self.checksum, self.num_features, self.num_groups];
        for (slot, word) in buf[WORDS_AT..].chunks_exact_mut(4).zip(words) {
            slot.copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Parse the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, DeserializeError> {
        let buf = bytes.get(..HEADER_SIZE).ok_or(DeserializeError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;

        if &buf[..4] != MAGIC {
            return Err(DeserializeError::NotAModel);
        }
        let (version_major, version_minor) = (buf[4], buf[5]);
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let word = |idx: usize| {
            let at = WORDS_AT + idx * 4;
            u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
        };
        let flags = u16::from_le_bytes([buf[8], buf[9]]);

        Ok(Self {
            version_major,
            version_minor,
            model_type: ModelType::try_from(buf[6])?,
            compressed: flags & FLAG_COMPRESSED != 0,
            payload_size: word(0),
            checksum: word(1),
            num_features: word(2),
            num_groups: word(3),
        })
    }
}

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    /// Payload does not fit the 32-bit size field.
    #[error("payload of {0} bytes is too large")]
    PayloadTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a byte buffer is not a usable model.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a model file")]
    NotAModel,

    #[error("model requires format {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    /// Payload decoded but does not describe a usable model.
    #[error("invalid model: {0}")]
    InvalidModel(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Prefix `payload` with `header`, filling in its size and checksum.
pub fn frame(header: &mut FormatHeader, payload: &[u8]) -> Result<Vec<u8>, SerializeError> {
    header.payload_size =
        u32::try_from(payload.len()).map_err(|_| SerializeError::PayloadTooLarge(payload.len()))?;
    header.checksum = crc32fast::hash(payload);

    let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
    output.extend_from_slice(&header.to_bytes());
    output.extend_from_slice(payload);
    Ok(output)
}

/// Split a framed buffer into its header and checksum-verified payload.
pub fn unframe(bytes: &[u8]) -> Result<(FormatHeader, &[u8]), DeserializeError> {
    let header = FormatHeader::parse(bytes)?;
    if header.compressed {
        return Err(DeserializeError::CorruptPayload(
            "compressed payloads are not supported".into(),
        ));
    }

    let body = &bytes[HEADER_SIZE..];
    let expected = header.payload_size as usize;
    match body.len().cmp(&expected) {
        std::cmp::Ordering::Less => {
            return Err(DeserializeError::Truncated {
                expected: HEADER_SIZE + expected,
                actual: bytes.len(),
            })
        }
        std::cmp::Ordering::Greater => {
            return Err(DeserializeError::CorruptPayload(format!(
                "{} trailing bytes after payload",
                body.len() - expected
            )))
        }
        std::cmp::Ordering::Equal => {}
    }

    let actual = crc32fast::hash(body);
    if actual != header.checksum {
        return Err(DeserializeError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }

    Ok((header, body))
}

/// Encode `payload` with postcard and frame it.
pub fn encode<T: Serialize>(
    model_type: ModelType,
    num_features: u32,
    num_groups: u32,
    payload: &T,
) -> Result<Vec<u8>, SerializeError> {
    let body = postcard::to_allocvec(payload)?;
    frame(&mut FormatHeader::new(model_type, num_features, num_groups), &body)
}

/// Unframe `bytes` and decode the payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(FormatHeader, T), DeserializeError> {
    let (header, body) = unframe(bytes)?;
    Ok((header, postcard::from_bytes(body)?))
}
