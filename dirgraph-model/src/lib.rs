//! Entity model for the dirgraph directory client.
//!
//! Defines the I/O-free types the client layer materializes server
//! payloads into:
//! - [`Entity`]: a typed view over a schema-less property bag
//! - [`EntityClass`]: how to build an entity of a given kind (type tag + API path)
//! - [`TypeRegistry`]: resolves untyped payloads to an [`EntityClass`]
//! - [`Table`]: the tabular (row/column) form of a page of records
//!
//! Nothing here performs network access; `dirgraph-client` consumes these
//! types when turning pages into results.

mod builtin;
mod class;
mod entity;
mod error;
pub mod odata;
mod registry;
mod table;

pub use builtin::{default_class, register_builtins};
pub use class::EntityClass;
pub use entity::{has_value, object_path, Entity, Properties};
pub use error::{ModelError, ModelResult};
pub use registry::{Classifier, TypeFilter, TypeRegistry};
pub use table::Table;
