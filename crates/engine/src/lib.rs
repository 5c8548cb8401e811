//! Validating store engine for shaclstore
//!
//! This crate ties the lower layers together:
//! - ShaclStore: data store, shape store, lock manager, published shapes and
//!   worker pool
//! - ShaclConnection: transaction lifecycle with validation at prepare
//! - TransactionSettings: per-transaction approach and performance hints
//! - ShaclConfig: `shacl.toml` configuration
//!
//! The engine is the only component that knows about:
//! - Routing writes between the data and shape stores
//! - Choosing between bulk, incremental and escalated validation
//! - Publishing recompiled shapes at commit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod settings;
pub mod store;

pub use config::{ShaclConfig, CONFIG_FILE_NAME};
pub use connection::{ConnectionState, ShaclConnection};
pub use settings::{PerformanceHint, TransactionSettings, ValidationApproach};
pub use store::{ShaclStore, ShapeList};
