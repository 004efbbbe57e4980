use chordfs_proto::{Id, IdError};
use thiserror::Error;
use tonic::Status;

pub type Result<T> = std::result::Result<T, ChordError>;

#[derive(Error, Debug)]
pub enum ChordError {
    #[error("lookup via {addr} failed: {source}")]
    Resolution { addr: String, source: Status },

    #[error("lookup abandoned after {0} hops")]
    HopLimitExceeded(u32),

    #[error("{addr} unreachable: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("RPC to {addr} failed: {status}")]
    Rpc { addr: String, status: Status },

    #[error("no replica of {key} could be fetched ({attempts} targets tried)")]
    StorageExhausted { key: Id, attempts: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ChordError> for Status {
    fn from(err: ChordError) -> Self {
        match err {
            ChordError::HopLimitExceeded(_) => Status::resource_exhausted(err.to_string()),
            ChordError::Resolution { .. } | ChordError::Unreachable { .. } => {
                Status::unavailable(err.to_string())
            }
            ChordError::Rpc { status, .. } => status,
            ChordError::StorageExhausted { .. } | ChordError::NotFound(_) => {
                Status::not_found(err.to_string())
            }
            ChordError::InvalidId(_) => Status::invalid_argument(err.to_string()),
            _ => Status::internal(err.to_string()),
        }
    }
}
