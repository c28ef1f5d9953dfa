//! `connectors` crate: the `Connector` trait, the connector registry and the
//! built-in connector implementations.
//!
//! Every external application, built-in or plugin, is reached
//! through a [`Connector`]. The engine crate resolves connectors by
//! [`Application`] tag through a [`ConnectorRegistry`].

pub mod application;
pub mod builtin;
pub mod error;
pub mod mock;
pub mod registry;
pub mod remote;
pub mod traits;

pub use application::Application;
pub use builtin::{builtin_registry, BuiltinSettings};
pub use error::{ConnectorError, RegistryError};
pub use registry::ConnectorRegistry;
pub use remote::{FallbackMode, RemoteClient, RemoteSettings};
pub use traits::{Config, Connector, ConnectorContext};
