//! SNDA Core - Sparse N-Dimensional Array Data Model
//!
//! This crate provides the pure data-model half of the workspace: datatype
//! tags, schemas, the tagged dimension-value form, the columnar buffer
//! exchange contract, metadata entries, the error taxonomy, and the
//! partitioning math. No I/O lives here.

pub mod buffers;
pub mod datatype;
pub mod error;
pub mod metadata;
pub mod schema;
pub mod traits;
pub mod types;
pub mod validation;
pub mod value;

pub use buffers::*;
pub use datatype::*;
pub use error::*;
pub use metadata::*;
pub use schema::*;
pub use traits::*;
pub use types::*;
pub use validation::*;
pub use value::*;
