//! apibind
//!
//! Runtime bindings over a Swagger / OpenAPI description: memoized model
//! classes for its shape definitions, callable requests for its operations,
//! and a bidirectional id/name catalog over collection-returning operations.
//!
//! ```no_run
//! use apibind::{ApiDescription, Client, ClientConfig, HttpMethod};
//!
//! # async fn demo() -> apibind::Result<()> {
//! let api = ApiDescription::from_path("netbox.yaml").await?;
//! let config = ClientConfig::builder()
//!     .base_url("http://localhost:32768")
//!     .header("Authorization", "Token 0123456789abcdef")
//!     .build()?;
//! let client = Client::new(api, &config)?;
//!
//! let request = client.command_request(HttpMethod::Get, "/ipam/vlans/")?;
//! let (payload, ok) = request.call(Default::default()).await?.into_parts();
//! # let _ = (payload, ok);
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod spec;
pub mod transport;

pub use crate::{
    catalog::{CatalogIndexer, IndexEntry, IndexerOptions, ItemId, KeySource},
    client::{Client, ClientConfig, ClientConfigBuilder},
    dispatch::{CallOutcome, FailureDetails, OperationDispatcher, Payload, Request, ResourceHandle},
    error::{Error, Result},
    model::{ModelClass, ModelInstance, ModelRegistry, PropertyType},
    spec::{ApiDescription, HttpMethod, OperationDescriptor, ParameterDescriptor, ParameterLocation},
    transport::{Arguments, HttpTransport, RawResponse, Transport, TransportError, TransportResponse},
};
