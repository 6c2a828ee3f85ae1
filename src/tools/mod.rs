//! Tool subsystem
//!
//! Discovery builds a [`Catalog`] of tool packages found on disk; the
//! [`Dispatcher`] binds an entry to a live [`Tool`] on first use and runs it.

pub mod builtin;
pub mod capability;
pub mod catalog;
pub mod descriptor;
pub mod discovery;
pub mod dispatcher;
pub mod loader;
pub mod native;

pub use capability::{optional_str, required_str, Parameters, Tool};
pub use catalog::{Catalog, CatalogBuilder, CatalogEntry, EntryState};
pub use descriptor::{ToolDescriptor, UiComponent, UiSchema};
pub use discovery::{discover_all, DiscoveryReport, PackageLayout, SkippedPackage};
pub use dispatcher::Dispatcher;
pub use loader::{
    DynamicLoader, ExportKind, ExportedType, LoadedUnit, StaticUnitLoader, ToolFactory,
    ToolLoader, UnitLoader,
};
pub use native::NativeUnitLoader;
