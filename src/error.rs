use crate::codec::types::{ObjectType, Required, Version};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of stream at offset {offset} (needed {needed} more bytes)")]
    TruncatedInput { offset: usize, needed: usize },

    #[error("unknown class name '{0}'")]
    UnknownClass(String),

    #[error("object of type {actual:?} does not satisfy required type {required:?}")]
    TypeMismatch { actual: ObjectType, required: Required },

    #[error("slot {slot} already holds an instance")]
    DuplicateInstance { slot: usize },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("required reference is null: {0}")]
    MissingRequiredReference(&'static str),

    #[error("save file declares version {found:?} but {expected:?} was expected")]
    VersionMismatch { found: Version, expected: Version },
}

pub type Result<T> = std::result::Result<T, Error>;
