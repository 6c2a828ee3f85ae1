//! Tools compiled into the host
//!
//! Each entry is reachable through `StaticUnitLoader::builtin()` by placing a
//! `<unit>.tool` marker file in the tool's package directory.

pub mod case_transform;

use super::loader::UnitExports;

pub use case_transform::CaseTransform;

/// Unit name and export list of every bundled tool
pub const UNITS: &[(&str, UnitExports)] = &[(case_transform::ID, case_transform::exports)];
