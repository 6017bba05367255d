//! Model definition entry point.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::MapperConfig;
use crate::error::MapperError;
use crate::mapper::Mapper;
use crate::metadata::{ModelOptions, Registry};
use crate::schema::SchemaNode;
use crate::transport::Transport;

/// Owns the model registry and the transport, and hands out mappers.
///
/// ```ignore
/// let repo = Repository::new(MapperConfig::from_env(), transport);
/// let users = repo.define::<User>(user_schema, ModelOptions::model().partition_key("id"))?;
/// users.put(&user).await?;
/// ```
#[derive(Clone)]
pub struct Repository {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Create a repository with an empty registry.
    #[must_use]
    pub fn new(config: MapperConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_registry(Arc::new(Registry::new(config)), transport)
    }

    /// Create a repository over an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<Registry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// The model registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register `T` with `schema` and return its mapper.
    pub fn define<T>(
        &self,
        schema: SchemaNode,
        options: ModelOptions,
    ) -> Result<Mapper<T>, MapperError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let meta = self.registry.register::<T>(options.schema(schema))?;
        Ok(Mapper::with_metadata(meta, Arc::clone(&self.transport)))
    }

    /// Register `T` with options that already carry a schema or shape.
    pub fn register<T>(&self, options: ModelOptions) -> Result<Mapper<T>, MapperError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let meta = self.registry.register::<T>(options)?;
        Ok(Mapper::with_metadata(meta, Arc::clone(&self.transport)))
    }

    /// A mapper for the already registered `T`.
    pub fn mapper<T>(&self) -> Result<Mapper<T>, MapperError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Mapper::new(&self.registry, Arc::clone(&self.transport))
    }
}
