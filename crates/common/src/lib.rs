//! mockwright common library
//!
//! Building blocks shared by the mock layer and the test runner: placeholder
//! substitution for fixture payloads, HAR recordings and test metadata.

pub mod error;
pub mod har;
pub mod types;
pub mod vars;

// Re-export commonly used types
pub use error::{Error, Result};
pub use har::{Har, HarEntry, HarLocation, HarStore};
pub use types::{Annotation, RunMode, TestInfo};
pub use vars::{replace_variables, unresolved_placeholders, Variables};

/// mockwright version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
