//! Native tool modules
//!
//! A native module is a shared library built against this crate. It exposes
//! one `TOOLHOST_MODULE` static, normally generated with [`export_tools!`]:
//!
//! ```ignore
//! #[derive(Default)]
//! pub struct WordCount;
//!
//! #[async_trait::async_trait]
//! impl toolhost::tools::Tool for WordCount { /* ... */ }
//!
//! toolhost::export_tools!(WordCount);
//! ```
//!
//! The declaration's ABI and host versions are checked before any export is
//! touched. The compiler version is not recorded: `Box<dyn Tool>` and `Vec`
//! cross the boundary, so modules must be built with the same rustc as the
//! host, and nothing here can detect a mismatch.

use super::loader::{ExportedType, LoadedUnit, UnitLoader};
use crate::error::LoadError;
use libloading::Library;
use std::path::Path;
use tracing::debug;

/// Bumped whenever `ModuleDeclaration` or `ExportedType` change layout
pub const ABI_VERSION: u32 = 1;

/// Version of the host crate a module was compiled against
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the declaration symbol, nul-terminated for `libloading`
pub const MODULE_SYMBOL: &[u8] = b"TOOLHOST_MODULE\0";

/// Static declaration every native module exports
#[derive(Clone, Copy)]
pub struct ModuleDeclaration {
    pub abi_version: u32,
    pub host_version: &'static str,
    pub exports: fn() -> Vec<ExportedType>,
}

/// Declare the tool types a native module exports, in selection order
#[macro_export]
macro_rules! export_tools {
    ($($tool:ty),+ $(,)?) => {
        #[doc(hidden)]
        #[no_mangle]
        pub static TOOLHOST_MODULE: $crate::tools::native::ModuleDeclaration =
            $crate::tools::native::ModuleDeclaration {
                abi_version: $crate::tools::native::ABI_VERSION,
                host_version: $crate::tools::native::HOST_VERSION,
                exports: __toolhost_exports,
            };

        #[doc(hidden)]
        fn __toolhost_exports() -> ::std::vec::Vec<$crate::tools::ExportedType> {
            vec![$($crate::tools::ExportedType::capability::<$tool>()),+]
        }
    };
}

/// Opens platform shared libraries (`.so`, `.dylib`, `.dll`)
#[derive(Debug)]
pub struct NativeUnitLoader {
    extension: String,
}

impl Default for NativeUnitLoader {
    fn default() -> Self {
        Self {
            extension: std::env::consts::DLL_EXTENSION.to_string(),
        }
    }
}

impl NativeUnitLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl UnitLoader for NativeUnitLoader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn open(&self, path: &Path) -> Result<LoadedUnit, LoadError> {
        debug!("Opening native module {:?}", path);

        // SAFETY: loaded modules are trusted; running their initializers is
        // the point of loading them.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Library {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: the symbol is produced by `export_tools!` with this exact type.
        let declaration: ModuleDeclaration = unsafe {
            let symbol = library
                .get::<*const ModuleDeclaration>(MODULE_SYMBOL)
                .map_err(|e| LoadError::SymbolNotFound {
                    path: path.to_path_buf(),
                    symbol: format!("TOOLHOST_MODULE ({})", e),
                })?;
            **symbol
        };

        let exports = read_exports(path, &declaration)?;
        Ok(LoadedUnit::with_library(path.to_path_buf(), exports, library))
    }
}

/// Validate a module declaration and collect its exports
fn read_exports(path: &Path, declaration: &ModuleDeclaration) -> Result<Vec<ExportedType>, LoadError> {
    check_compatible(declaration)?;

    let exports = (declaration.exports)();
    debug!("{:?} exports {} types", path, exports.len());
    Ok(exports)
}

fn check_compatible(declaration: &ModuleDeclaration) -> Result<(), LoadError> {
    if declaration.abi_version != ABI_VERSION || declaration.host_version != HOST_VERSION {
        return Err(LoadError::AbiMismatch {
            expected: format!("abi {} / toolhost {}", ABI_VERSION, HOST_VERSION),
            found: format!(
                "abi {} / toolhost {}",
                declaration.abi_version, declaration.host_version
            ),
        });
    }
    Ok(())
}
