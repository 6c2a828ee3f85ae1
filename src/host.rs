//! Tool host
//!
//! The context object owning the catalog and dispatcher. It is created once
//! at startup: discovery fills the catalog, after which membership is fixed
//! and only per-entry bindings change.

use crate::config::{LoaderKind, ToolsConfig};
use crate::error::DispatchError;
use crate::tools::catalog::{Catalog, CatalogEntry, EntryState};
use crate::tools::descriptor::UiSchema;
use crate::tools::discovery::{discover_all, PackageLayout, SkippedPackage};
use crate::tools::loader::{DynamicLoader, StaticUnitLoader, ToolLoader};
use crate::tools::native::NativeUnitLoader;
use crate::tools::{Dispatcher, Parameters};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Listing projection of a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub tags: Vec<String>,
}

/// Detail projection of a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetail {
    #[serde(flatten)]
    pub summary: ToolSummary,
    pub ui_schema: Option<UiSchema>,
    pub state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_at: Option<DateTime<Utc>>,
}

impl From<&CatalogEntry> for ToolSummary {
    fn from(entry: &CatalogEntry) -> Self {
        let d = entry.descriptor();
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            description: d.description.clone(),
            version: d.version.clone(),
            author: d.author.clone(),
            tags: d.tags.clone(),
        }
    }
}

impl From<&CatalogEntry> for ToolDetail {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            summary: ToolSummary::from(entry),
            ui_schema: entry.ui_schema().cloned(),
            state: entry.state(),
            bound_at: entry.bound_at(),
        }
    }
}

#[derive(Debug)]
pub struct ToolHost {
    catalog: Arc<Catalog>,
    dispatcher: Dispatcher,
    skipped: Vec<SkippedPackage>,
}

impl ToolHost {
    /// Discover tools and wire up the loader selected in `config`
    pub fn bootstrap(config: &ToolsConfig) -> Self {
        Self::with_loader(config, loader_for(config))
    }

    /// Discover tools and dispatch them through a caller-provided loader
    ///
    /// An unreadable tools directory is logged and yields an empty catalog.
    pub fn with_loader(config: &ToolsConfig, loader: Arc<dyn ToolLoader>) -> Self {
        let layout = PackageLayout::from(config);
        let (catalog, skipped) = match discover_all(&config.directory, &layout) {
            Ok(report) => (report.catalog, report.skipped),
            Err(e) => {
                error!("Error discovering tools: {}", e);
                (Catalog::default(), Vec::new())
            }
        };
        info!(
            "Tool host ready: {} tools from {:?}",
            catalog.len(),
            config.directory
        );

        let catalog = Arc::new(catalog);
        let dispatcher = Dispatcher::new(Arc::clone(&catalog), loader)
            .with_timeouts(config.load_timeout(), config.execute_timeout());

        Self {
            catalog,
            dispatcher,
            skipped,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Packages rejected during discovery
    pub fn skipped(&self) -> &[SkippedPackage] {
        &self.skipped
    }

    pub fn list(&self) -> Vec<ToolSummary> {
        self.catalog
            .get_all()
            .iter()
            .map(|entry| ToolSummary::from(entry.as_ref()))
            .collect()
    }

    pub fn detail(&self, id: &str) -> Option<ToolDetail> {
        self.catalog
            .get_by_id(id)
            .map(|entry| ToolDetail::from(entry.as_ref()))
    }

    pub async fn execute(&self, id: &str, parameters: Parameters) -> Result<Value, DispatchError> {
        self.dispatcher.execute(id, parameters).await
    }
}

/// Build the `ToolLoader` for the configured unit kind
pub fn loader_for(config: &ToolsConfig) -> Arc<dyn ToolLoader> {
    match config.loader {
        LoaderKind::Builtin => {
            let mut units = StaticUnitLoader::builtin();
            if let Some(ext) = &config.unit_extension {
                units = units.with_extension(ext.clone());
            }
            Arc::new(DynamicLoader::new(units))
        }
        LoaderKind::Native => {
            let units = match &config.unit_extension {
                Some(ext) => NativeUnitLoader::with_extension(ext.clone()),
                None => NativeUnitLoader::new(),
            };
            Arc::new(DynamicLoader::new(units))
        }
    }
}
