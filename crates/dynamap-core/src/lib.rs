//! Typed records over a partition/sort-key item store.
//!
//! Models are registered once in a [`Registry`] (usually through a
//! [`Repository`]) and accessed through a [`Mapper<T>`]. Compact models are
//! stored as key attributes plus one packed value produced by the [`codec`],
//! which drops field names, memoizes repeated values and replaces common
//! literals with one-letter tags. The store itself sits behind the
//! [`Transport`] trait.
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod keys;
pub mod mapper;
pub mod metadata;
pub mod query;
pub mod repository;
pub mod schema;
pub mod transport;

pub use config::MapperConfig;
pub use entity::Entity;
pub use error::{CodecError, MapperError, QueryError};
pub use keys::Keys;
pub use mapper::{Mapper, Page, WriteOp};
pub use metadata::{ModelMetadata, ModelOptions, Registry};
pub use query::{ConditionKind, Operator, QueryBuilder};
pub use repository::Repository;
pub use schema::{FieldShape, RecordShape, SchemaNode};
pub use transport::Transport;
