//! Schema-checked MQTT publisher for Unified Namespace payloads.
//!
//! Every payload is routed to a schema by its topic (or, failing that, its
//! shape), checked against that schema and only then published.
//!
//! # Crate Structure
//!
//! - [`schema`]: schema names, the registry and the validation gate
//! - [`topic`]: topic parsing, the namespace builder and the classifier
//! - [`transport`]: broker configuration and the MQTT transport
//! - [`pipeline`]: the publisher and its cycle loop
//! - [`fixture`]: demo payload catalogs for a pump station and a tank area

pub mod fixture;

/// Re-export schema types.
pub mod schema {
    pub use unspub_schema::*;
}

/// Re-export topic types.
pub mod topic {
    pub use unspub_topic::*;
}

/// Re-export transport types.
pub mod transport {
    pub use unspub_transport::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use unspub_pipeline::*;
}
