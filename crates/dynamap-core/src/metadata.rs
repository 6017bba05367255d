//! Model metadata registry.
//!
//! Every model type is registered once with a [`ModelOptions`] value; the
//! resulting [`ModelMetadata`] tells the mapper which table to address, which
//! attributes hold the keys and whether records are stored compactly.

use std::any::{TypeId, type_name};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::config::MapperConfig;
use crate::error::MapperError;
use crate::schema::{RecordShape, SchemaNode, ShapeCache};

/// Default partition key attribute name.
pub const DEFAULT_PARTITION_KEY: &str = "PK";

/// Names of the key attributes of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNames {
    /// Partition key attribute.
    pub partition: String,
    /// Sort key attribute, if the table has one.
    pub sort: Option<String>,
}

impl Default for KeyNames {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION_KEY.to_owned(),
            sort: None,
        }
    }
}

/// Resolved, immutable metadata of one model type.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    /// Short type name of the model.
    pub model: String,
    /// Physical table name, prefix included.
    pub table: String,
    /// Key attribute names.
    pub keys: KeyNames,
    /// Sort key value used when a call does not supply one.
    pub default_sort_key: Option<String>,
    /// Whether records are stored as a compact value.
    pub compact: bool,
    /// Positional shape used by the compact codec.
    pub shape: Arc<RecordShape>,
}

/// Registration options for a model.
///
/// Setters may be called in any order; unset values take defaults at
/// registration time.
///
/// ```
/// use dynamap_core::metadata::ModelOptions;
/// use dynamap_core::schema::SchemaNode;
///
/// let options = ModelOptions::model()
///     .schema(SchemaNode::object([("name", SchemaNode::String)]))
///     .sort_key("SK")
///     .default_sort_key("PROFILE")
///     .table("USERS");
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    table: Option<String>,
    partition_key: Option<String>,
    sort_key: Option<String>,
    default_sort_key: Option<String>,
    compact: Option<bool>,
    schema: Option<SchemaNode>,
    shape: Option<RecordShape>,
}

impl ModelOptions {
    /// Options for a plain model: attributes are stored as-is.
    #[must_use]
    pub fn entity() -> Self {
        Self::default().compact(false)
    }

    /// Options for a compact model: non-key attributes are packed into one
    /// value.
    #[must_use]
    pub fn model() -> Self {
        Self::default().compact(true)
    }

    /// Override the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the partition key attribute name.
    #[must_use]
    pub fn partition_key(mut self, name: impl Into<String>) -> Self {
        self.partition_key = Some(name.into());
        self
    }

    /// Declare a sort key attribute.
    #[must_use]
    pub fn sort_key(mut self, name: impl Into<String>) -> Self {
        self.sort_key = Some(name.into());
        self
    }

    /// Set both key attribute names.
    #[must_use]
    pub fn keys(self, partition: impl Into<String>, sort: impl Into<String>) -> Self {
        self.partition_key(partition).sort_key(sort)
    }

    /// Sort key value used when a call does not supply one.
    #[must_use]
    pub fn default_sort_key(mut self, value: impl Into<String>) -> Self {
        self.default_sort_key = Some(value.into());
        self
    }

    /// Store records compactly, or not.
    #[must_use]
    pub fn compact(mut self, compact: bool) -> Self {
        self.compact = Some(compact);
        self
    }

    /// Derive the compact shape from a schema.
    #[must_use]
    pub fn schema(mut self, schema: SchemaNode) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use an explicit compact shape. Takes precedence over [`Self::schema`].
    #[must_use]
    pub fn shape(mut self, shape: RecordShape) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// Registry of model metadata, keyed by model type.
#[derive(Debug, Default)]
pub struct Registry {
    config: MapperConfig,
    models: DashMap<TypeId, Arc<ModelMetadata>>,
    shapes: ShapeCache,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            models: DashMap::new(),
            shapes: ShapeCache::new(),
        }
    }

    /// The configuration this registry resolves names with.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// The shape cache used for schema-derived shapes.
    #[must_use]
    pub fn shapes(&self) -> &ShapeCache {
        &self.shapes
    }

    /// Register `T`. A type can only be registered once.
    pub fn register<T: 'static>(
        &self,
        options: ModelOptions,
    ) -> Result<Arc<ModelMetadata>, MapperError> {
        let model = short_type_name::<T>();
        let compact = options.compact.unwrap_or(self.config.compact_by_default);

        let shape = match (options.shape, &options.schema) {
            (Some(shape), _) => Arc::new(shape),
            (None, Some(schema)) => self.shapes.get_or_extract(schema),
            (None, None) if compact => {
                return Err(MapperError::configuration(format!(
                    "compact model {model} needs a schema or shape"
                )));
            }
            (None, None) => Arc::new(RecordShape::default()),
        };
        if compact && shape.is_empty() {
            return Err(MapperError::configuration(format!(
                "compact model {model} has an empty shape"
            )));
        }

        let table = options
            .table
            .unwrap_or_else(|| pluralize(&model.to_uppercase()));
        let meta = Arc::new(ModelMetadata {
            table: self.config.table_name(&table),
            keys: KeyNames {
                partition: options
                    .partition_key
                    .unwrap_or_else(|| DEFAULT_PARTITION_KEY.to_owned()),
                sort: options.sort_key,
            },
            default_sort_key: options.default_sort_key,
            compact,
            shape,
            model,
        });

        match self.models.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(MapperError::configuration(format!(
                "model {} is already registered",
                meta.model
            ))),
            Entry::Vacant(slot) => {
                debug!(
                    model = %meta.model,
                    table = %meta.table,
                    compact = meta.compact,
                    "registered model"
                );
                slot.insert(Arc::clone(&meta));
                Ok(meta)
            }
        }
    }

    /// Metadata of `T`.
    pub fn metadata<T: 'static>(&self) -> Result<Arc<ModelMetadata>, MapperError> {
        self.models
            .get(&TypeId::of::<T>())
            .map(|m| Arc::clone(m.value()))
            .ok_or_else(|| {
                MapperError::configuration(format!(
                    "model {} is not registered",
                    short_type_name::<T>()
                ))
            })
    }

    /// Whether `T` has been registered.
    #[must_use]
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.models.contains_key(&TypeId::of::<T>())
    }
}

/// The last path segment of `T`'s name, without generic arguments.
fn short_type_name<T>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

/// English plural of an upper-case identifier.
fn pluralize(word: &str) -> String {
    const ES_SUFFIXES: [&str; 5] = ["S", "X", "Z", "CH", "SH"];

    if let Some(stem) = word.strip_suffix('Y') {
        let consonant = stem
            .chars()
            .last()
            .is_some_and(|c| !matches!(c, 'A' | 'E' | 'I' | 'O' | 'U'));
        if consonant {
            return format!("{stem}IES");
        }
    }
    if ES_SUFFIXES.iter().any(|s| word.ends_with(s)) {
        return format!("{word}ES");
    }
    format!("{word}S")
}
