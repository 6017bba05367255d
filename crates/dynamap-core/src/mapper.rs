//! The model mapper.
//!
//! A [`Mapper<T>`] turns typed records into store items and back, using the
//! [`ModelMetadata`] registered for `T`. Compact models store their non-key
//! attributes as one packed value under the `V` attribute; plain models store
//! attributes as-is. Every operation resolves and validates keys before it
//! issues its single transport call.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dynamap_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    UpdateItemInput,
};
use dynamap_model::output::BatchWriteItemOutput;
use dynamap_model::types::{KeysAndAttributes, WriteRequest};
use dynamap_model::{AttributeValue, Item, Key};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::codec::{self, COMPACT_ATTRIBUTE};
use crate::entity::Entity;
use crate::error::MapperError;
use crate::keys::{Keys, key_for, key_for_write};
use crate::metadata::{ModelMetadata, Registry};
use crate::query::QueryBuilder;
use crate::schema::FieldShape;
use crate::transport::Transport;

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp<T> {
    /// Store a record; keys are taken from the record.
    Put(T),
    /// Store a record under explicit keys.
    PutWithKeys(T, Keys),
    /// Delete the item under these keys.
    Delete(Keys),
}

/// One page of a scan or query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Decoded records, in store order.
    pub items: Vec<Entity<T>>,
    /// Cursor to pass as `ExclusiveStartKey` for the next page.
    pub last_evaluated_key: Option<Key>,
}

/// Typed access to the items of one model.
pub struct Mapper<T> {
    meta: Arc<ModelMetadata>,
    transport: Arc<dyn Transport>,
    query: QueryBuilder,
    cursor: Arc<Mutex<Option<Key>>>,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for Mapper<T> {
    fn clone(&self) -> Self {
        Self {
            meta: Arc::clone(&self.meta),
            transport: Arc::clone(&self.transport),
            query: self.query.clone(),
            cursor: Arc::clone(&self.cursor),
            _model: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("model", &self.meta.model)
            .field("table", &self.meta.table)
            .field("compact", &self.meta.compact)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl<T> Mapper<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a mapper for `T`, which must be registered in `registry`.
    pub fn new(registry: &Registry, transport: Arc<dyn Transport>) -> Result<Self, MapperError> {
        let meta = registry.metadata::<T>()?;
        Ok(Self::with_metadata(meta, transport))
    }

    /// Create a mapper from already resolved metadata.
    #[must_use]
    pub fn with_metadata(meta: Arc<ModelMetadata>, transport: Arc<dyn Transport>) -> Self {
        Self {
            meta,
            transport,
            query: QueryBuilder::new(),
            cursor: Arc::new(Mutex::new(None)),
            _model: PhantomData,
        }
    }

    /// The model's metadata.
    #[must_use]
    pub fn metadata(&self) -> &ModelMetadata {
        &self.meta
    }

    /// The physical table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.meta.table
    }

    /// The conditions this mapper scans and queries with.
    #[must_use]
    pub fn query_builder(&self) -> &QueryBuilder {
        &self.query
    }

    /// A mapper bound to a fresh query builder configured by `build`.
    ///
    /// The new mapper records pagination cursors on this mapper's root, so
    /// [`Self::last_evaluated_key`] reads the same cursor on both.
    #[must_use]
    pub fn scoped(&self, build: impl FnOnce(&mut QueryBuilder)) -> Self {
        let mut query = QueryBuilder::new();
        build(&mut query);
        Self {
            query,
            ..self.clone()
        }
    }

    /// The cursor left by the last scan or query on this mapper's root.
    #[must_use]
    pub fn last_evaluated_key(&self) -> Option<Key> {
        self.cursor.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Single-item operations
    // -----------------------------------------------------------------------

    /// Read the record stored under `keys`.
    ///
    /// Array-shaped models store several records per item; use
    /// [`Self::get_list`] for them.
    pub async fn get(&self, keys: impl Into<Keys>) -> Result<Option<Entity<T>>, MapperError> {
        if self.meta.shape.is_repeated() {
            return Err(MapperError::configuration(format!(
                "{} stores lists of records; use get_list",
                self.meta.model
            )));
        }
        Ok(self.get_rows(&keys.into()).await?.pop())
    }

    /// Read every record stored under `keys`.
    pub async fn get_list(&self, keys: impl Into<Keys>) -> Result<Vec<Entity<T>>, MapperError> {
        self.get_rows(&keys.into()).await
    }

    async fn get_rows(&self, keys: &Keys) -> Result<Vec<Entity<T>>, MapperError> {
        let key = key_for(&self.meta, keys)?;
        debug!(table = %self.meta.table, "get_item");
        let output = self
            .transport
            .get_item(GetItemInput {
                table_name: self.meta.table.clone(),
                key,
                consistent_read: None,
            })
            .await?;
        output
            .item
            .map_or_else(|| Ok(Vec::new()), |item| self.entities(&item))
    }

    /// Store `record`, taking its keys from the record itself.
    pub async fn put(&self, record: &T) -> Result<Key, MapperError> {
        self.put_value(serde_json::to_value(record)?, None).await
    }

    /// Store `record` under explicit `keys`.
    pub async fn put_with_keys(
        &self,
        record: &T,
        keys: impl Into<Keys>,
    ) -> Result<Key, MapperError> {
        self.put_value(serde_json::to_value(record)?, Some(&keys.into()))
            .await
    }

    /// Store a list of records as one item of an array-shaped model.
    pub async fn put_list(&self, records: &[T], keys: impl Into<Keys>) -> Result<Key, MapperError> {
        if !self.meta.shape.is_repeated() {
            return Err(MapperError::configuration(format!(
                "{} does not store lists of records",
                self.meta.model
            )));
        }
        self.put_value(serde_json::to_value(records)?, Some(&keys.into()))
            .await
    }

    async fn put_value(&self, value: Value, keys: Option<&Keys>) -> Result<Key, MapperError> {
        let (key, item) = self.to_item(value, keys)?;
        debug!(table = %self.meta.table, compact = self.meta.compact, "put_item");
        self.transport
            .put_item(PutItemInput {
                table_name: self.meta.table.clone(),
                item,
            })
            .await?;
        Ok(key)
    }

    /// Overwrite attributes of the item under `keys`.
    ///
    /// Compact models rewrite the whole packed value, so `attrs` must name
    /// every non-key field of the shape (an explicit `null` counts). Array
    /// shaped models cannot be updated; store the list again with
    /// [`Self::put_list`].
    pub async fn update<A: Serialize>(
        &self,
        attrs: &A,
        keys: impl Into<Keys>,
    ) -> Result<(), MapperError> {
        if self.meta.shape.is_repeated() {
            return Err(MapperError::configuration(format!(
                "{} stores lists of records; use put_list",
                self.meta.model
            )));
        }
        let key = key_for(&self.meta, &keys.into())?;
        let mut attrs = self.to_object(serde_json::to_value(attrs)?)?;
        self.strip_keys(&mut attrs);
        if attrs.is_empty() {
            return Err(MapperError::configuration(format!(
                "update of {} has no attributes",
                self.meta.model
            )));
        }

        let mut names = HashMap::new();
        let mut values = HashMap::new();
        let expression = if self.meta.compact {
            let missing = self.missing_fields(&attrs);
            if !missing.is_empty() {
                return Err(MapperError::configuration(format!(
                    "update of compact model {} must set every field; missing {}",
                    self.meta.model,
                    missing.join(", ")
                )));
            }
            let packed = codec::encode(&Value::Object(attrs), &self.meta.shape)?;
            names.insert("#V".to_owned(), COMPACT_ATTRIBUTE.to_owned());
            values.insert(":V".to_owned(), AttributeValue::S(packed));
            "SET #V = :V".to_owned()
        } else {
            let assignments: Vec<String> = attrs
                .into_iter()
                .enumerate()
                .map(|(i, (name, value))| {
                    names.insert(format!("#u{i}"), name);
                    values.insert(format!(":u{i}"), AttributeValue::from(value));
                    format!("#u{i} = :u{i}")
                })
                .collect();
            format!("SET {}", assignments.join(", "))
        };

        debug!(table = %self.meta.table, expression = %expression, "update_item");
        self.transport
            .update_item(UpdateItemInput {
                table_name: self.meta.table.clone(),
                key,
                update_expression: Some(expression),
                expression_attribute_names: names,
                expression_attribute_values: values,
            })
            .await?;
        Ok(())
    }

    /// Delete the item under `keys`.
    pub async fn delete(&self, keys: impl Into<Keys>) -> Result<(), MapperError> {
        let key = key_for(&self.meta, &keys.into())?;
        debug!(table = %self.meta.table, "delete_item");
        self.transport
            .delete_item(DeleteItemInput {
                table_name: self.meta.table.clone(),
                key,
            })
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scan & query
    // -----------------------------------------------------------------------

    /// Scan one page with this mapper's filter conditions.
    pub async fn scan(&self) -> Result<Vec<Entity<T>>, MapperError> {
        Ok(self.scan_page().await?.items)
    }

    /// Scan one page and keep the records `pred` accepts.
    pub async fn scan_with(
        &self,
        pred: impl Fn(&Entity<T>) -> bool,
    ) -> Result<Vec<Entity<T>>, MapperError> {
        let mut items = self.scan().await?;
        items.retain(|e| pred(e));
        Ok(items)
    }

    /// Scan one page, returning the cursor along with the records.
    pub async fn scan_page(&self) -> Result<Page<T>, MapperError> {
        let input = self.query.filters(self.meta.table.clone())?;
        debug!(
            table = %self.meta.table,
            filter = ?input.filter_expression,
            "scan"
        );
        let output = self.transport.scan(input).await?;
        self.page(output.items, output.last_evaluated_key)
    }

    /// Query one page with this mapper's key and filter conditions.
    pub async fn query(&self) -> Result<Vec<Entity<T>>, MapperError> {
        Ok(self.query_page().await?.items)
    }

    /// Query one page and keep the records `pred` accepts.
    pub async fn query_with(
        &self,
        pred: impl Fn(&Entity<T>) -> bool,
    ) -> Result<Vec<Entity<T>>, MapperError> {
        let mut items = self.query().await?;
        items.retain(|e| pred(e));
        Ok(items)
    }

    /// Query one page, returning the cursor along with the records.
    pub async fn query_page(&self) -> Result<Page<T>, MapperError> {
        let input = self.query.conditions(self.meta.table.clone())?;
        debug!(
            table = %self.meta.table,
            key_condition = ?input.key_condition_expression,
            index = ?input.index_name,
            "query"
        );
        let output = self.transport.query(input).await?;
        self.page(output.items, output.last_evaluated_key)
    }

    fn page(&self, items: Vec<Item>, last_key: Key) -> Result<Page<T>, MapperError> {
        let mut entities = Vec::with_capacity(items.len());
        for item in &items {
            entities.extend(self.entities(item)?);
        }

        let last_evaluated_key = (!last_key.is_empty()).then_some(last_key);
        self.cursor.lock().clone_from(&last_evaluated_key);
        Ok(Page {
            items: entities,
            last_evaluated_key,
        })
    }

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    /// Read several items, in the order the store returns them.
    ///
    /// Keys the store left unprocessed are dropped; use
    /// [`Self::batch_get_partial`] to retry them.
    pub async fn batch_get<K: Into<Keys>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Vec<Entity<T>>, MapperError> {
        Ok(self.batch_get_partial(keys).await?.0)
    }

    /// Read several items, also returning the keys the store did not process.
    pub async fn batch_get_partial<K: Into<Keys>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<(Vec<Entity<T>>, Vec<Key>), MapperError> {
        let keys = keys
            .into_iter()
            .map(|k| key_for(&self.meta, &k.into()))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(table = %self.meta.table, count = keys.len(), "batch_get_item");
        let mut output = self
            .transport
            .batch_get_item(BatchGetItemInput {
                request_items: HashMap::from([(
                    self.meta.table.clone(),
                    KeysAndAttributes {
                        keys,
                        consistent_read: None,
                    },
                )]),
            })
            .await?;

        let items = output
            .responses
            .remove(&self.meta.table)
            .unwrap_or_default();
        let unprocessed = output
            .unprocessed_keys
            .remove(&self.meta.table)
            .map(|request| request.keys)
            .unwrap_or_default();
        if !unprocessed.is_empty() {
            debug!(
                table = %self.meta.table,
                unprocessed = unprocessed.len(),
                "batch_get_item returned unprocessed keys"
            );
        }

        let mut entities = Vec::with_capacity(items.len());
        for item in &items {
            entities.extend(self.entities(item)?);
        }
        Ok((entities, unprocessed))
    }

    /// Apply a mix of puts and deletes. Not atomic.
    pub async fn batch_write(
        &self,
        ops: impl IntoIterator<Item = WriteOp<T>>,
    ) -> Result<BatchWriteItemOutput, MapperError> {
        let requests = ops
            .into_iter()
            .map(|op| self.write_request(op))
            .collect::<Result<Vec<_>, _>>()?;
        self.send_batch(requests).await
    }

    /// Apply loosely-typed write descriptors.
    ///
    /// `{"put": record}` stores a record; `{"delete": {"pk": .., "sk": ..}}` or
    /// `{"delete": "pk"}` deletes an item. Any other shape is skipped.
    pub async fn batch_write_raw(
        &self,
        descriptors: impl IntoIterator<Item = Value>,
    ) -> Result<BatchWriteItemOutput, MapperError> {
        let mut requests = Vec::new();
        for descriptor in descriptors {
            let Value::Object(mut descriptor) = descriptor else {
                debug!(table = %self.meta.table, "skipping non-object write descriptor");
                continue;
            };
            if let Some(record) = descriptor.remove("put") {
                requests.push(self.put_request(record, None)?);
            } else if let Some(keys) = descriptor.get("delete").and_then(raw_keys) {
                requests.push(WriteRequest::delete(key_for(&self.meta, &keys)?));
            } else {
                debug!(table = %self.meta.table, "skipping unrecognized write descriptor");
            }
        }
        self.send_batch(requests).await
    }

    /// Delete several items.
    pub async fn delete_many<K: Into<Keys>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<BatchWriteItemOutput, MapperError> {
        self.batch_write(keys.into_iter().map(|k| WriteOp::Delete(k.into())))
            .await
    }

    /// Store several records, taking keys from each record.
    pub async fn put_many(
        &self,
        records: impl IntoIterator<Item = T>,
    ) -> Result<BatchWriteItemOutput, MapperError> {
        self.batch_write(records.into_iter().map(WriteOp::Put)).await
    }

    async fn send_batch(
        &self,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteItemOutput, MapperError> {
        if requests.is_empty() {
            debug!(table = %self.meta.table, "batch_write_item with no requests skipped");
            return Ok(BatchWriteItemOutput::default());
        }
        debug!(table = %self.meta.table, count = requests.len(), "batch_write_item");
        let output = self
            .transport
            .batch_write_item(BatchWriteItemInput {
                request_items: HashMap::from([(self.meta.table.clone(), requests)]),
            })
            .await?;
        Ok(output)
    }

    fn write_request(&self, op: WriteOp<T>) -> Result<WriteRequest, MapperError> {
        match op {
            WriteOp::Put(record) => self.put_request(serde_json::to_value(&record)?, None),
            WriteOp::PutWithKeys(record, keys) => {
                self.put_request(serde_json::to_value(&record)?, Some(&keys))
            }
            WriteOp::Delete(keys) => Ok(WriteRequest::delete(key_for(&self.meta, &keys)?)),
        }
    }

    fn put_request(&self, value: Value, keys: Option<&Keys>) -> Result<WriteRequest, MapperError> {
        let (_, item) = self.to_item(value, keys)?;
        Ok(WriteRequest::put(item))
    }

    // -----------------------------------------------------------------------
    // Write & read paths
    // -----------------------------------------------------------------------

    /// Build the stored item of a serialized record.
    fn to_item(&self, value: Value, keys: Option<&Keys>) -> Result<(Key, Item), MapperError> {
        if self.meta.compact && self.meta.shape.is_repeated() {
            let Value::Array(records) = value else {
                return Err(MapperError::configuration(format!(
                    "{} stores lists of records; use put_list",
                    self.meta.model
                )));
            };
            let key = key_for_write(&self.meta, &Map::new(), keys)?;
            let records = records
                .into_iter()
                .map(|r| -> Result<Value, MapperError> {
                    let mut r = self.to_object(r)?;
                    self.strip_keys(&mut r);
                    Ok(Value::Object(r))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let packed = codec::encode(&Value::Array(records), &self.meta.shape)?;
            return Ok(self.compact_item(key, packed));
        }

        let mut record = self.to_object(value)?;
        let key = key_for_write(&self.meta, &record, keys)?;

        if self.meta.compact {
            self.strip_keys(&mut record);
            let packed = codec::encode(&Value::Object(record), &self.meta.shape)?;
            return Ok(self.compact_item(key, packed));
        }

        let mut item: Item = record
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::from(value)))
            .collect();
        item.extend(key.clone());
        Ok((key, item))
    }

    fn compact_item(&self, key: Key, packed: String) -> (Key, Item) {
        trace!(model = %self.meta.model, len = packed.len(), "packed record");
        let mut item = key.clone();
        item.insert(COMPACT_ATTRIBUTE.to_owned(), AttributeValue::S(packed));
        (key, item)
    }

    fn to_object(&self, value: Value) -> Result<Map<String, Value>, MapperError> {
        match value {
            Value::Object(map) => Ok(map),
            other => Err(MapperError::configuration(format!(
                "{} must serialize to an object, got {}",
                self.meta.model,
                json_kind(&other)
            ))),
        }
    }

    /// Top-level non-key fields of the shape that `attrs` does not set.
    fn missing_fields(&self, attrs: &Map<String, Value>) -> Vec<&str> {
        let keys = &self.meta.keys;
        self.meta
            .shape
            .fields()
            .iter()
            .map(FieldShape::name)
            .filter(|name| *name != keys.partition && keys.sort.as_deref() != Some(*name))
            .filter(|name| !attrs.contains_key(*name))
            .collect()
    }

    fn strip_keys(&self, record: &mut Map<String, Value>) {
        record.remove(&self.meta.keys.partition);
        if let Some(sort) = &self.meta.keys.sort {
            record.remove(sort);
        }
    }

    /// Decode a stored item into one or more entities.
    fn entities(&self, item: &Item) -> Result<Vec<Entity<T>>, MapperError> {
        let pk = item.get(&self.meta.keys.partition).cloned();
        let sk = self
            .meta
            .keys
            .sort
            .as_ref()
            .and_then(|name| item.get(name))
            .cloned();
        let packed = item.contains_key(COMPACT_ATTRIBUTE);

        let rows = match codec::decode_item(item, &self.meta.shape)? {
            Value::Array(rows) if packed && self.meta.shape.is_repeated() => {
                trace!(model = %self.meta.model, rows = rows.len(), "expanded stored item");
                rows
            }
            record => vec![record],
        };

        rows.into_iter()
            .map(|mut record| -> Result<Entity<T>, MapperError> {
                if packed {
                    self.attach_keys(&mut record, pk.as_ref(), sk.as_ref());
                }
                let record: T = serde_json::from_value(record)?;
                Ok(Entity::new(record, pk.clone(), sk.clone()))
            })
            .collect()
    }

    /// Put key values back into a decoded record whose shape declares them.
    fn attach_keys(
        &self,
        record: &mut Value,
        pk: Option<&AttributeValue>,
        sk: Option<&AttributeValue>,
    ) {
        let Value::Object(map) = record else {
            return;
        };
        let shape = &self.meta.shape;
        if let Some(pk) = pk.filter(|_| shape.declares(&self.meta.keys.partition)) {
            map.insert(self.meta.keys.partition.clone(), pk.clone().into_json());
        }
        if let (Some(name), Some(sk)) = (&self.meta.keys.sort, sk) {
            if shape.declares(name) {
                map.insert(name.clone(), sk.clone().into_json());
            }
        }
    }
}

/// Keys of a raw delete descriptor: `"pk"` or `{"pk": .., "sk": ..}`.
fn raw_keys(value: &Value) -> Option<Keys> {
    match value {
        Value::String(pk) => Some(Keys::partition(pk.as_str())),
        Value::Object(map) => {
            let pk = map.get("pk").filter(|v| !v.is_null())?.clone();
            Some(match map.get("sk").filter(|v| !v.is_null()) {
                Some(sk) => Keys::composite(pk, sk.clone()),
                None => Keys::partition(pk),
            })
        }
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
