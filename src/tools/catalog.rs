//! Tool catalog
//!
//! Built once by discovery through a `CatalogBuilder`, then shared read-only.
//! Membership never changes after `build()`; the only mutation left is the
//! one-time binding of a loaded instance inside each entry.

use super::capability::Tool;
use super::descriptor::{ToolDescriptor, UiSchema};
use crate::error::LoadError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::watch;
use tracing::debug;

/// Binding state of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryState {
    /// Found on disk, no instance loaded yet (or the last load failed)
    Discovered,
    /// Instance loaded and cached for the rest of the process
    Bound,
}

struct Binding {
    tool: Arc<dyn Tool>,
    bound_at: DateTime<Utc>,
}

/// Outcome of a load attempt; `None` while it is still running
type AttemptOutcome = Option<Result<Arc<dyn Tool>, LoadError>>;

enum Joined {
    Bound(Arc<dyn Tool>),
    Waiting(watch::Receiver<AttemptOutcome>),
}

/// The discovery-time record for one tool plus its lazily bound instance
pub struct CatalogEntry {
    descriptor: ToolDescriptor,
    ui_schema: Option<UiSchema>,
    package_dir: PathBuf,
    binding: OnceLock<Binding>,
    attempt: Mutex<Option<watch::Receiver<AttemptOutcome>>>,
}

impl CatalogEntry {
    pub fn new(descriptor: ToolDescriptor, ui_schema: Option<UiSchema>, package_dir: PathBuf) -> Self {
        Self {
            descriptor,
            ui_schema,
            package_dir,
            binding: OnceLock::new(),
            attempt: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn ui_schema(&self) -> Option<&UiSchema> {
        self.ui_schema.as_ref()
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// The bound instance, if any
    pub fn instance(&self) -> Option<Arc<dyn Tool>> {
        self.binding.get().map(|b| Arc::clone(&b.tool))
    }

    pub fn bound_at(&self) -> Option<DateTime<Utc>> {
        self.binding.get().map(|b| b.bound_at)
    }

    pub fn state(&self) -> EntryState {
        if self.binding.get().is_some() {
            EntryState::Bound
        } else {
            EntryState::Discovered
        }
    }

    /// Return the bound instance, running `load` first if the entry is unbound
    ///
    /// At most one load attempt runs at a time. It is spawned onto the
    /// runtime, so callers that stop waiting do not cancel it, and every
    /// caller waiting on it receives the same outcome. After a failed
    /// attempt the entry stays unbound and the next caller starts a new one.
    pub async fn bind_with<F, Fut>(self: &Arc<Self>, load: F) -> Result<Arc<dyn Tool>, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Tool>, LoadError>> + Send + 'static,
    {
        match self.join_attempt(load) {
            Joined::Bound(tool) => Ok(tool),
            Joined::Waiting(rx) => wait_for_outcome(rx).await,
        }
    }

    /// Subscribe to the running attempt, starting one if there is none
    fn join_attempt<F, Fut>(self: &Arc<Self>, load: F) -> Joined
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Tool>, LoadError>> + Send + 'static,
    {
        if let Some(tool) = self.instance() {
            return Joined::Bound(tool);
        }

        let mut attempt = self.attempt.lock().unwrap_or_else(|e| e.into_inner());
        // Bound by an attempt that finished while we waited for the lock
        if let Some(tool) = self.instance() {
            return Joined::Bound(tool);
        }
        if let Some(rx) = attempt.as_ref() {
            debug!("Joining in-flight load of '{}'", self.id());
            return Joined::Waiting(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        *attempt = Some(rx.clone());

        let entry = Arc::clone(self);
        let load = load();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(load).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LoadError::Instantiation("load attempt panicked".to_string())),
            };
            entry.finish_attempt(&outcome);
            let _ = tx.send(Some(outcome));
        });

        Joined::Waiting(rx)
    }

    fn finish_attempt(&self, outcome: &Result<Arc<dyn Tool>, LoadError>) {
        let mut attempt = self.attempt.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(tool) = outcome {
            let _ = self.binding.set(Binding {
                tool: Arc::clone(tool),
                bound_at: Utc::now(),
            });
        }
        *attempt = None;
    }
}

async fn wait_for_outcome(
    mut rx: watch::Receiver<AttemptOutcome>,
) -> Result<Arc<dyn Tool>, LoadError> {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if rx.changed().await.is_err() {
            let last = rx.borrow().clone();
            return last.unwrap_or_else(|| {
                Err(LoadError::Instantiation("load attempt was abandoned".to_string()))
            });
        }
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("id", &self.descriptor.id)
            .field("package_dir", &self.package_dir)
            .field("state", &self.state())
            .finish()
    }
}

/// Write phase of the catalog, used only during discovery
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: HashMap<String, Arc<CatalogEntry>>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the one it replaced (last write wins)
    pub fn insert(&mut self, entry: CatalogEntry) -> Option<Arc<CatalogEntry>> {
        self.entries.insert(entry.id().to_string(), Arc::new(entry))
    }

    pub fn build(self) -> Catalog {
        Catalog {
            entries: self.entries,
        }
    }
}

/// Read-only index of discovered tools, keyed by id
#[derive(Debug, Default)]
pub struct Catalog {
    entries: HashMap<String, Arc<CatalogEntry>>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// All entries, sorted by id
    pub fn get_all(&self) -> Vec<Arc<CatalogEntry>> {
        let mut entries: Vec<Arc<CatalogEntry>> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.id().cmp(b.id()));
        entries
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<CatalogEntry>> {
        self.entries.get(id).cloned()
    }

    /// All ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
