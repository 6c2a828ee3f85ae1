//! Tool discovery
//!
//! Scans the tools directory and builds the catalog. Each immediate
//! subdirectory is one package; a bad package is skipped with a warning and
//! never aborts the sweep.

use super::catalog::{Catalog, CatalogEntry};
use super::descriptor::{ToolDescriptor, UiSchema};
use crate::config::ToolsConfig;
use crate::error::DiscoveryError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File names looked up inside each package
#[derive(Debug, Clone)]
pub struct PackageLayout {
    pub descriptor_file: String,
    pub ui_schema_file: String,
}

impl Default for PackageLayout {
    fn default() -> Self {
        Self::from(&ToolsConfig::default())
    }
}

impl From<&ToolsConfig> for PackageLayout {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            descriptor_file: config.descriptor_file.clone(),
            ui_schema_file: config.ui_schema_file.clone(),
        }
    }
}

/// A package directory that did not make it into the catalog
#[derive(Debug)]
pub struct SkippedPackage {
    pub path: PathBuf,
    pub reason: DiscoveryError,
}

/// Outcome of a discovery sweep
#[derive(Debug)]
pub struct DiscoveryReport {
    pub catalog: Catalog,
    pub skipped: Vec<SkippedPackage>,
}

/// Discover every tool package under `root`
///
/// Subdirectories are visited in lexicographic order of their names, so when
/// two packages declare the same id the later name wins.
pub fn discover_all(root: &Path, layout: &PackageLayout) -> Result<DiscoveryReport, DiscoveryError> {
    let entries = fs::read_dir(root).map_err(|source| DiscoveryError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut package_dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| !is_hidden(path))
        .collect();
    package_dirs.sort();

    let mut builder = Catalog::builder();
    let mut skipped = Vec::new();

    for dir in package_dirs {
        match load_package(&dir, layout) {
            Ok(entry) => {
                info!(
                    "Discovered tool: {} ({})",
                    entry.descriptor().name,
                    entry.id()
                );
                if let Some(previous) = builder.insert(entry) {
                    warn!(
                        "Tool id '{}' from {:?} replaces the one from {:?}",
                        previous.id(),
                        dir,
                        previous.package_dir()
                    );
                }
            }
            Err(reason) => {
                warn!("Skipping directory {:?}: {}", dir, reason);
                skipped.push(SkippedPackage { path: dir, reason });
            }
        }
    }

    let catalog = builder.build();
    debug!(
        "Discovery finished: {} tools, {} skipped",
        catalog.len(),
        skipped.len()
    );

    Ok(DiscoveryReport { catalog, skipped })
}

/// Read one package directory into a catalog entry
fn load_package(dir: &Path, layout: &PackageLayout) -> Result<CatalogEntry, DiscoveryError> {
    let descriptor_path = dir.join(&layout.descriptor_file);
    if !descriptor_path.is_file() {
        return Err(DiscoveryError::MissingDescriptor(descriptor_path));
    }
    let descriptor = ToolDescriptor::from_file(&descriptor_path)?;

    let ui_schema_path = dir.join(&layout.ui_schema_file);
    let ui_schema = if ui_schema_path.is_file() {
        Some(UiSchema::from_file(&ui_schema_path)?)
    } else {
        None
    };

    Ok(CatalogEntry::new(descriptor, ui_schema, dir.to_path_buf()))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
