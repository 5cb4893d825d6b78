// === Errors and configuration ===
pub mod error;
pub mod config;

// === Records and durable storage ===
pub mod sidechain;
pub mod store;

// === Registry, overlay views and block driver ===
pub mod registry;
pub mod view;
pub mod chain;

// === Consensus rules ===
pub mod validation;

pub use chain::{connect_block, disconnect_block};
pub use config::RegistryConfig;
pub use error::{ConfigError, RegistryError, StoreError, ViewError};
pub use registry::SidechainRegistry;
pub use sidechain::{ScCreationParameters, ScInfo, ScInfoMap, ScLookup};
pub use store::{MemoryRecordStore, RecordStore, RocksRecordStore};
pub use validation::{RejectReason, Rejection, ScValidator, REJECT_INVALID};
pub use view::ScView;
