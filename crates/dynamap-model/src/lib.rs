//! Wire types for the dynamap store transport.
//!
//! This crate holds the request/response shapes the mapper exchanges with a
//! partition/sort-key addressed store: the [`AttributeValue`] union, the
//! input/output structs of the eight item operations, and the transport error
//! type. Field names follow the store's `PascalCase` JSON wire protocol so the
//! structs can be handed to an HTTP client as-is.
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{StoreError, StoreErrorCode};
pub use operations::StoreOperation;
pub use types::{Item, Key};
