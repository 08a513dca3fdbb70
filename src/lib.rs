//! mintdoc: generate Mintlify MDX reference pages from JSDoc-annotated
//! JavaScript and TypeScript sources.
//!
//! A run is a batch transform per package:
//! [`scan`] → [`parser`] → [`parser::merge`] → [`render`] → [`nav`],
//! driven by [`pipeline::generate_package`].

pub mod config;
pub mod error;
pub mod model;
pub mod nav;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod scan;
pub mod slug;

pub use config::{Config, PackageConfig};
pub use error::{EmitError, GenerateError};
pub use pipeline::{generate_package, GenerateOptions};
pub use report::PackageReport;
