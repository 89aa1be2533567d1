//! Configuration for the tool registry.
//!
//! [`RegistryConfig`] carries the tunables of every component and
//! [`CatalogSource`] parses declarative tool catalogs. Both accept TOML or
//! JSON; files are dispatched on their extension.

#![warn(missing_docs, clippy::pedantic)]

mod catalog;
mod error;
mod format;
mod registry;

pub use catalog::{CatalogEntry, CatalogSource};
pub use error::{ConfigError, ConfigResult};
pub use format::Format;
pub use registry::RegistryConfig;
