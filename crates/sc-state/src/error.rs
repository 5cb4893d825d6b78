use sc_core::{Amount, ScId};
use thiserror::Error;

/// Failures at the durable store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid record type {0:#04x}")]
    InvalidRecordType(u8),

    #[error("Malformed record key of {0} bytes")]
    MalformedKey(usize),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Database(e.into_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Sidechain registry already loaded from store")]
    AlreadyLoaded,

    #[error("Sidechain store not initialized")]
    StoreNotOpen,

    #[error("Store scan interrupted by shutdown request")]
    Interrupted,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Overlay failures. Any of these means the view must be discarded.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Sidechain {0} already exists")]
    AlreadyExists(ScId),

    #[error("Sidechain {0} not found")]
    NotFound(ScId),

    #[error("Balance of sidechain {sc_id} would become negative ({balance} + {amount})")]
    NegativeBalance {
        sc_id: ScId,
        balance: Amount,
        amount: Amount,
    },

    #[error("Balance of sidechain {0} exceeds the money supply")]
    BalanceOverflow(ScId),

    #[error("Sidechain {sc_id} still holds balance {balance}")]
    NonZeroBalance { sc_id: ScId, balance: Amount },

    #[error("View is stale: built on generation {view}, registry is at {registry}")]
    StaleView { view: u64, registry: u64 },

    #[error("Sidechain {0} scheduled for erasure is not in the registry")]
    EraseTargetMissing(ScId),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
