//! Error types for lattix-memory.

use crate::tag::{MemId, MemoryTag};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("no memory backend registered for device {0}")]
    NoBackend(MemoryTag),

    #[error("transfer of block {id} on device {tag} failed: {message}")]
    Transfer {
        tag: MemoryTag,
        id: MemId,
        message: String,
    },

    #[error("memory of block {id} on device {tag} is not host-addressable")]
    NotAddressable { tag: MemoryTag, id: MemId },
}

pub type Result<T> = std::result::Result<T, MemoryError>;
