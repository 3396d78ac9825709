//! Model storage: the native `.bstr` container and its payload layout.

pub mod convert;
pub mod native;
pub mod payload;

pub use native::{
    decode, encode, DeserializeError, FormatHeader, ModelType, SerializeError,
    CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, HEADER_SIZE, MAGIC,
};
pub use payload::{ForestPayload, ModelMetadata, Payload, PayloadV1, TreePayload};
