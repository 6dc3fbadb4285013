//! Core types and service wiring for the binlevel fill-level ingestion service.

/// Fill-level computation from raw sensor distances.
pub mod fill;
/// Domain models and identifiers shared by all stores.
pub mod model;
/// Traits describing the document store interface.
pub mod ports;
/// Mapping between domain records and stored documents.
pub mod records;
/// Ingestion service used by transports.
pub mod service;
/// Structural validation of raw telemetry submissions.
pub mod validate;

pub use fill::*;
pub use model::*;
pub use ports::*;
pub use records::*;
pub use service::*;
pub use validate::*;
