//! Per-language extractors

pub mod c_family;
pub mod python;

pub use c_family::{CFamilyExtractor, Dialect};
pub use python::PythonExtractor;
