//! Named JSON Schema registry and validation gate for UNS payloads.
//!
//! The registry loads the ten fixed schema documents from a schema store.
//! Documents that cannot be read or compiled are recorded as missing rather
//! than failing the load, so a publisher can run with partial coverage.
//!
//! [`validate`] is the gate every payload passes before it is published:
//! a resolved and loaded schema blocks on violations, anything else is an
//! advisory pass.

pub mod config;
pub mod error;
pub mod name;
pub mod registry;
pub mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use name::{Classification, SchemaName};
pub use registry::{SchemaDocument, SchemaRegistry};
pub use validator::{validate, Advisory, InstancePath, Rejection, ValidationOutcome};
