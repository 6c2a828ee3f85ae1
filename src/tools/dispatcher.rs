//! Execution dispatcher
//!
//! Resolves an id in the catalog, binds an instance on first use and runs it.
//! Loading happens on the blocking pool and execution on its own task, both
//! under a timeout, so a misbehaving tool only ever produces an error value.

use super::capability::{Parameters, Tool};
use super::catalog::{Catalog, CatalogEntry};
use super::loader::ToolLoader;
use crate::config::ToolsConfig;
use crate::error::{DispatchError, ExecutionError, LoadError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct Dispatcher {
    catalog: Arc<Catalog>,
    loader: Arc<dyn ToolLoader>,
    load_timeout: Duration,
    execute_timeout: Duration,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, loader: Arc<dyn ToolLoader>) -> Self {
        let defaults = ToolsConfig::default();
        Self {
            catalog,
            loader,
            load_timeout: defaults.load_timeout(),
            execute_timeout: defaults.execute_timeout(),
        }
    }

    pub fn with_timeouts(mut self, load_timeout: Duration, execute_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self.execute_timeout = execute_timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Execute the tool registered under `id`
    pub async fn execute(&self, id: &str, parameters: Parameters) -> Result<Value, DispatchError> {
        let invocation = Uuid::new_v4();
        let span = info_span!("execute", tool = %id, %invocation);

        async move {
            let entry = self
                .catalog
                .get_by_id(id)
                .ok_or_else(|| DispatchError::NotFound(id.to_string()))?;

            let tool = self.bind(&entry).await.map_err(|source| {
                error!("Failed to load tool: {}", source);
                DispatchError::Load {
                    id: id.to_string(),
                    source,
                }
            })?;

            let result = self.invoke(tool, parameters).await.map_err(|source| {
                warn!("Execution failed: {}", source);
                DispatchError::Execution {
                    id: id.to_string(),
                    source,
                }
            })?;

            debug!("Execution succeeded");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Return the entry's instance, loading it exactly once across callers
    ///
    /// The timeout covers the whole wait, including time spent behind a
    /// load another caller started.
    async fn bind(&self, entry: &Arc<CatalogEntry>) -> Result<Arc<dyn Tool>, LoadError> {
        let load_timeout = self.load_timeout;
        let attempt = entry.bind_with(|| {
            let loader = Arc::clone(&self.loader);
            let package_dir = entry.package_dir().to_path_buf();
            let id = entry.id().to_string();

            async move {
                info!("Binding tool from {:?}", package_dir);
                let handle = tokio::task::spawn_blocking(move || {
                    loader.load_executable(&package_dir, &id)
                });

                match timeout(load_timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        if join_err.is_panic() {
                            error!("Loader panicked");
                            Err(LoadError::Instantiation("loader panicked".to_string()))
                        } else {
                            Err(LoadError::Instantiation("load was cancelled".to_string()))
                        }
                    }
                    Err(_) => {
                        warn!("Loading timed out after {:?}", load_timeout);
                        Err(LoadError::Timeout(load_timeout))
                    }
                }
            }
            .in_current_span()
        });

        match timeout(load_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Gave up waiting for load after {:?}", load_timeout);
                Err(LoadError::Timeout(load_timeout))
            }
        }
    }

    /// Run a bound instance on its own task
    async fn invoke(&self, tool: Arc<dyn Tool>, parameters: Parameters) -> Result<Value, ExecutionError> {
        let handle = tokio::spawn(async move { tool.execute(&parameters).await });
        let abort = handle.abort_handle();

        match timeout(self.execute_timeout, handle).await {
            Ok(Ok(result)) => result.map_err(ExecutionError::from),
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    error!("Tool execution panicked");
                    Err(ExecutionError::Panicked)
                } else {
                    error!("Tool execution cancelled");
                    Err(ExecutionError::Cancelled)
                }
            }
            Err(_) => {
                abort.abort();
                warn!("Tool execution timed out after {:?}", self.execute_timeout);
                Err(ExecutionError::Timeout(self.execute_timeout))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.catalog.len())
            .field("load_timeout", &self.load_timeout)
            .field("execute_timeout", &self.execute_timeout)
            .finish()
    }
}
