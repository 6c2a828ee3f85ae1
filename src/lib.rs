//! toolhost - discovery, lazy loading and dispatch of packaged tools
//!
//! Tool packages are directories holding a `metadata.yaml` descriptor, an
//! optional `ui-schema.yaml`, and a loadable unit. [`ToolHost`] discovers
//! them once at startup and binds each to a live [`tools::Tool`] the first
//! time it is executed.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod tools;

pub use config::Config;
pub use error::{DispatchError, ErrorKind, ErrorResponse, LoadError};
pub use host::{ToolDetail, ToolHost, ToolSummary};
