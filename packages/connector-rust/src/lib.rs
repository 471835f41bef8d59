//! `idbridge` Connector: configuration, schema catalog, destination registry
//! and the search/update orchestration over the core codecs.
//!
//! Remote calls go through the [`traits::RemoteFunctions`] and
//! [`traits::FieldCatalog`] seams; this crate never opens a connection
//! itself.

pub mod catalog;
pub mod config;
pub mod error;
pub mod registry;
pub mod search;
pub mod traits;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::SchemaCatalog;
pub use config::{ConnectorConfig, TableAttributeConfig};
pub use error::ConnectorError;
pub use registry::{DestinationProperties, DestinationRegistry, Registration};
pub use search::SearchExecutor;
pub use traits::{AccountDetail, AccountSelection, FieldCatalog, FieldDescriptor, RemoteFunctions};
pub use update::{ChangeRequest, ChangeRequestBuilder, ScalarChange, TableChange};
