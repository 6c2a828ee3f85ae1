//! Dynamic tool loader
//!
//! Turns a package directory into a live tool instance:
//! 1. resolve the unit file (`<id>.<ext>`, else the first `*.<ext>` by name)
//! 2. open it through a `UnitLoader` (cached per path for the process lifetime)
//! 3. pick the first exported type that implements `Tool`
//! 4. construct it through its factory
//!
//! The dispatcher only sees the `ToolLoader` trait, so how units are
//! physically opened stays behind `UnitLoader`.

use super::capability::Tool;
use crate::error::LoadError;
use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Default construction path of an exported tool type
pub type ToolFactory = fn() -> Box<dyn Tool>;

/// What an exported type is
#[derive(Clone, Copy)]
pub enum ExportKind {
    /// Implements `Tool` and can be constructed
    Capability(ToolFactory),
    /// Anything else a module chooses to advertise
    Other,
}

/// A type advertised by a loaded unit
#[derive(Clone, Copy)]
pub struct ExportedType {
    pub name: &'static str,
    pub kind: ExportKind,
}

impl ExportedType {
    /// Export a `Tool` constructed through `Default`
    pub fn capability<T: Tool + Default + 'static>() -> Self {
        fn create<T: Tool + Default + 'static>() -> Box<dyn Tool> {
            Box::new(T::default())
        }
        Self {
            name: std::any::type_name::<T>(),
            kind: ExportKind::Capability(create::<T>),
        }
    }

    pub fn other(name: &'static str) -> Self {
        Self {
            name,
            kind: ExportKind::Other,
        }
    }

    pub fn is_capability(&self) -> bool {
        matches!(self.kind, ExportKind::Capability(_))
    }
}

impl std::fmt::Debug for ExportedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedType")
            .field("name", &self.name)
            .field("capability", &self.is_capability())
            .finish()
    }
}

/// An opened unit, kept alive for as long as any instance created from it
pub struct LoadedUnit {
    path: PathBuf,
    exports: Vec<ExportedType>,
    // Held so a native library is never unloaded
    _library: Option<libloading::Library>,
}

impl LoadedUnit {
    pub fn new(path: PathBuf, exports: Vec<ExportedType>) -> Self {
        Self {
            path,
            exports,
            _library: None,
        }
    }

    pub fn with_library(path: PathBuf, exports: Vec<ExportedType>, library: libloading::Library) -> Self {
        Self {
            path,
            exports,
            _library: Some(library),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exports(&self) -> &[ExportedType] {
        &self.exports
    }

    /// Construct the first exported `Tool` implementation
    pub fn instantiate(&self) -> Result<Box<dyn Tool>, LoadError> {
        let (name, factory) = self
            .exports
            .iter()
            .find_map(|export| match export.kind {
                ExportKind::Capability(factory) => Some((export.name, factory)),
                ExportKind::Other => None,
            })
            .ok_or_else(|| LoadError::NoImplementation(self.path.clone()))?;

        debug!("Instantiating {} from {:?}", name, self.path);
        panic::catch_unwind(AssertUnwindSafe(factory))
            .map_err(|_| LoadError::Instantiation(format!("constructor of {} panicked", name)))
    }
}

impl std::fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("path", &self.path)
            .field("exports", &self.exports)
            .field("native", &self._library.is_some())
            .finish()
    }
}

/// Opens unit files of one kind
pub trait UnitLoader: Send + Sync {
    /// File extension (without dot) of the units this loader opens
    fn extension(&self) -> &str;

    fn open(&self, path: &Path) -> Result<LoadedUnit, LoadError>;
}

/// Lists the exports of a unit compiled into the host
pub type UnitExports = fn() -> Vec<ExportedType>;

/// Unit loader backed by a compile-time table
///
/// The unit file is a marker; its file stem selects the table entry.
pub struct StaticUnitLoader {
    extension: String,
    units: HashMap<String, UnitExports>,
}

impl StaticUnitLoader {
    pub const DEFAULT_EXTENSION: &'static str = "tool";

    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            units: HashMap::new(),
        }
    }

    /// Loader preloaded with the tools bundled in this crate
    pub fn builtin() -> Self {
        let mut loader = Self::new(Self::DEFAULT_EXTENSION);
        for (name, exports) in super::builtin::UNITS {
            loader.register(*name, *exports);
        }
        loader
    }

    pub fn register(&mut self, unit: impl Into<String>, exports: UnitExports) -> &mut Self {
        self.units.insert(unit.into(), exports);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn units(&self) -> Vec<String> {
        let mut units: Vec<String> = self.units.keys().cloned().collect();
        units.sort();
        units
    }
}

impl UnitLoader for StaticUnitLoader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn open(&self, path: &Path) -> Result<LoadedUnit, LoadError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let exports = self
            .units
            .get(stem)
            .ok_or_else(|| LoadError::UnregisteredUnit(stem.to_string()))?;

        Ok(LoadedUnit::new(path.to_path_buf(), exports()))
    }
}

/// Turns a package directory into a tool instance
pub trait ToolLoader: Send + Sync {
    fn load_executable(&self, package_dir: &Path, id: &str) -> Result<Arc<dyn Tool>, LoadError>;
}

/// Per-path cache slot, locked only while that path is being opened
type UnitSlot = Arc<Mutex<Option<Arc<LoadedUnit>>>>;

/// `ToolLoader` that resolves unit files and opens them with a `UnitLoader`
pub struct DynamicLoader {
    units: Box<dyn UnitLoader>,
    opened: Mutex<HashMap<PathBuf, UnitSlot>>,
}

impl DynamicLoader {
    pub fn new(units: impl UnitLoader + 'static) -> Self {
        Self {
            units: Box::new(units),
            opened: Mutex::new(HashMap::new()),
        }
    }

    /// Find the unit file for `id` inside `package_dir`
    pub fn resolve_unit(&self, package_dir: &Path, id: &str) -> Result<PathBuf, LoadError> {
        let extension = self.units.extension();

        let named = package_dir.join(format!("{}.{}", id, extension));
        if named.is_file() {
            return Ok(named);
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(package_dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
            .collect();
        candidates.sort();

        if candidates.len() > 1 {
            warn!(
                "{} .{} units in {:?}, using {:?}",
                candidates.len(),
                extension,
                package_dir,
                candidates[0]
            );
        }

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| LoadError::UnitNotFound {
                dir: package_dir.to_path_buf(),
                extension: extension.to_string(),
            })
    }

    /// Open a unit, reusing it if this path was opened before
    ///
    /// A unit that hangs in `open` only blocks callers of the same path.
    fn open_unit(&self, path: &Path) -> Result<Arc<LoadedUnit>, LoadError> {
        let slot = {
            let mut opened = self.opened.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(opened.entry(path.to_path_buf()).or_default())
        };

        // Held across `open` so a unit is opened at most once
        let mut cached = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(unit) = cached.as_ref() {
            return Ok(Arc::clone(unit));
        }

        info!("Loading unit {:?}", path);
        let unit = Arc::new(self.units.open(path)?);
        *cached = Some(Arc::clone(&unit));
        Ok(unit)
    }

    /// Number of distinct units opened so far
    pub fn opened_units(&self) -> usize {
        let opened = self.opened.lock().unwrap_or_else(|e| e.into_inner());
        opened
            .values()
            .filter(|slot| matches!(slot.try_lock(), Ok(unit) if unit.is_some()))
            .count()
    }
}

impl ToolLoader for DynamicLoader {
    fn load_executable(&self, package_dir: &Path, id: &str) -> Result<Arc<dyn Tool>, LoadError> {
        let path = self.resolve_unit(package_dir, id)?;
        let unit = self.open_unit(&path)?;
        let tool = unit.instantiate()?;

        if tool.id() != id {
            warn!(
                "Tool loaded for '{}' from {:?} reports id '{}'",
                id,
                path,
                tool.id()
            );
        }
        Ok(Arc::from(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tools::capability::Parameters;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn id(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "Echo"
        }
        fn description(&self) -> &str {
            "Returns its parameters"
        }
        async fn execute(&self, parameters: &Parameters) -> Result<Value, ToolError> {
            Ok(Value::Object(parameters.clone()))
        }
    }

    struct Exploding;

    impl Default for Exploding {
        fn default() -> Self {
            panic!("constructor failure")
        }
    }

    #[async_trait]
    impl Tool for Exploding {
        fn id(&self) -> &str {
            "exploding"
        }
        fn name(&self) -> &str {
            "Exploding"
        }
        fn description(&self) -> &str {
            ""
        }
        async fn execute(&self, _parameters: &Parameters) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn echo_exports() -> Vec<ExportedType> {
        vec![ExportedType::other("Helper"), ExportedType::capability::<Echo>()]
    }

    fn helper_only() -> Vec<ExportedType> {
        vec![ExportedType::other("Helper")]
    }

    fn exploding_exports() -> Vec<ExportedType> {
        vec![ExportedType::capability::<Exploding>()]
    }

    fn test_loader() -> DynamicLoader {
        let mut units = StaticUnitLoader::new("tool");
        units
            .register("echo", echo_exports)
            .register("helpers", helper_only)
            .register("exploding", exploding_exports);
        DynamicLoader::new(units)
    }

    fn package(files: &[&str]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for file in files {
            fs::write(temp_dir.path().join(file), b"").unwrap();
        }
        temp_dir
    }

    #[test]
    fn test_resolve_prefers_unit_named_after_id() {
        let dir = package(&["aaa.tool", "echo.tool"]);
        let loader = test_loader();

        let path = loader.resolve_unit(dir.path(), "echo").unwrap();
        assert!(path.ends_with("echo.tool"));
    }

    #[test]
    fn test_resolve_falls_back_to_first_by_name() {
        let dir = package(&["zz.tool", "echo.tool", "notes.txt"]);
        let loader = test_loader();

        let path = loader.resolve_unit(dir.path(), "other-id").unwrap();
        assert!(path.ends_with("echo.tool"));
    }

    #[test]
    fn test_resolve_no_unit() {
        let dir = package(&["readme.md"]);
        let loader = test_loader();

        let result = loader.resolve_unit(dir.path(), "echo");
        assert!(matches!(result, Err(LoadError::UnitNotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_selects_first_capability() {
        let dir = package(&["echo.tool"]);
        let loader = test_loader();

        let tool = loader.load_executable(dir.path(), "echo").unwrap();
        assert_eq!(tool.id(), "echo");

        let params = json!({"k": "v"}).as_object().cloned().unwrap();
        let output = tool.execute(&params).await.unwrap();
        assert_eq!(output, json!({"k": "v"}));
    }

    #[test]
    fn test_unit_opened_once_per_path() {
        let dir = package(&["echo.tool"]);
        let loader = test_loader();

        loader.load_executable(dir.path(), "echo").unwrap();
        loader.load_executable(dir.path(), "echo").unwrap();
        assert_eq!(loader.opened_units(), 1);
    }

    /// Blocks in `open` for `hang.tool` until released
    struct GatedUnits {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl UnitLoader for GatedUnits {
        fn extension(&self) -> &str {
            "tool"
        }

        fn open(&self, path: &Path) -> Result<LoadedUnit, LoadError> {
            if path.file_stem().and_then(|s| s.to_str()) == Some("hang") {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(LoadedUnit::new(path.to_path_buf(), echo_exports()))
        }
    }

    #[test]
    fn test_stuck_unit_does_not_block_other_packages() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let loader = Arc::new(DynamicLoader::new(GatedUnits {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        }));
        let hang_dir = package(&["hang.tool"]);
        let fast_dir = package(&["fast.tool"]);

        let hanging = {
            let loader = Arc::clone(&loader);
            let dir = hang_dir.path().to_path_buf();
            thread::spawn(move || loader.load_executable(&dir, "hang").is_ok())
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let loader = Arc::clone(&loader);
            let dir = fast_dir.path().to_path_buf();
            thread::spawn(move || {
                let _ = done_tx.send(loader.load_executable(&dir, "fast").is_ok());
            });
        }
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert_eq!(loader.opened_units(), 1);

        release_tx.send(()).unwrap();
        assert!(hanging.join().unwrap());
        assert_eq!(loader.opened_units(), 2);
    }

    #[test]
    fn test_no_implementation() {
        let dir = package(&["helpers.tool"]);
        let loader = test_loader();

        let result = loader.load_executable(dir.path(), "helpers");
        assert!(matches!(result, Err(LoadError::NoImplementation(_))));
    }

    #[test]
    fn test_unregistered_unit() {
        let dir = package(&["mystery.tool"]);
        let loader = test_loader();

        let result = loader.load_executable(dir.path(), "mystery");
        assert!(matches!(result, Err(LoadError::UnregisteredUnit(name)) if name == "mystery"));
    }

    #[test]
    fn test_constructor_panic_becomes_load_error() {
        let dir = package(&["exploding.tool"]);
        let loader = test_loader();

        let result = loader.load_executable(dir.path(), "exploding");
        assert!(matches!(result, Err(LoadError::Instantiation(_))));
    }

    #[test]
    fn test_builtin_table_contains_case_transform() {
        let loader = StaticUnitLoader::builtin();
        assert!(loader.units().contains(&"case-transform".to_string()));
        assert_eq!(loader.extension(), "tool");
    }
}
