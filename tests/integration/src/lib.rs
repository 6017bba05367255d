//! Integration tests for the dynamap mapper.
//!
//! The tests run the mapper against [`MemoryTransport`], an in-process store
//! that keeps items per table, records every request it receives and can be
//! told to fail the next call. Key conditions and filter expressions are
//! recorded but not evaluated; scans and queries return every item of the
//! table, paginated by `Limit` and `ExclusiveStartKey`.
//!
//! Run them with:
//! ```text
//! cargo test -p dynamap-integration
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Once};

use dynamap_core::Transport;
use dynamap_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, UpdateItemInput,
};
use dynamap_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, UpdateItemOutput,
};
use dynamap_model::{AttributeValue, Item, Key, StoreError, StoreOperation};
use parking_lot::Mutex;

mod test_compact;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A request received by [`MemoryTransport`].
#[derive(Debug, Clone)]
pub enum Call {
    /// `GetItem`.
    GetItem(GetItemInput),
    /// `PutItem`.
    PutItem(PutItemInput),
    /// `UpdateItem`.
    UpdateItem(UpdateItemInput),
    /// `DeleteItem`.
    DeleteItem(DeleteItemInput),
    /// `Scan`.
    Scan(ScanInput),
    /// `Query`.
    Query(QueryInput),
    /// `BatchGetItem`.
    BatchGetItem(BatchGetItemInput),
    /// `BatchWriteItem`.
    BatchWriteItem(BatchWriteItemInput),
}

impl Call {
    /// The operation of this call.
    #[must_use]
    pub fn operation(&self) -> StoreOperation {
        match self {
            Self::GetItem(_) => StoreOperation::GetItem,
            Self::PutItem(_) => StoreOperation::PutItem,
            Self::UpdateItem(_) => StoreOperation::UpdateItem,
            Self::DeleteItem(_) => StoreOperation::DeleteItem,
            Self::Scan(_) => StoreOperation::Scan,
            Self::Query(_) => StoreOperation::Query,
            Self::BatchGetItem(_) => StoreOperation::BatchGetItem,
            Self::BatchWriteItem(_) => StoreOperation::BatchWriteItem,
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    key_names: Vec<String>,
    items: Vec<Item>,
}

impl Table {
    fn key_of(&self, item: &Item) -> Key {
        self.key_names
            .iter()
            .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    fn position(&self, key: &Key) -> Option<usize> {
        self.items.iter().position(|item| &self.key_of(item) == key)
    }

    fn put(&mut self, item: Item) {
        let key = self.key_of(&item);
        match self.position(&key) {
            Some(i) => self.items[i] = item,
            None => self.items.push(item),
        }
    }

    fn delete(&mut self, key: &Key) {
        if let Some(i) = self.position(key) {
            self.items.remove(i);
        }
    }

    fn page(&self, start: &Key, limit: Option<i32>) -> (Vec<Item>, Key) {
        let from = if start.is_empty() {
            0
        } else {
            self.position(start).map_or(self.items.len(), |i| i + 1)
        };
        let rest = &self.items[from.min(self.items.len())..];
        let take = limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(rest.len())
            .min(rest.len());
        let page = rest[..take].to_vec();
        let last_key = if take < rest.len() {
            page.last().map(|item| self.key_of(item)).unwrap_or_default()
        } else {
            Key::new()
        };
        (page, last_key)
    }
}

/// An in-memory store transport.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    tables: Mutex<HashMap<String, Table>>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<StoreError>>,
    batch_get_limit: Mutex<Option<usize>>,
}

impl MemoryTransport {
    /// Create a transport with the given tables and their key attribute names.
    #[must_use]
    pub fn with_tables(tables: &[(&str, &[&str])]) -> Arc<Self> {
        let transport = Self::default();
        {
            let mut guard = transport.tables.lock();
            for (name, keys) in tables {
                guard.insert(
                    (*name).to_owned(),
                    Table {
                        key_names: keys.iter().map(|k| (*k).to_owned()).collect(),
                        items: Vec::new(),
                    },
                );
            }
        }
        Arc::new(transport)
    }

    /// Items of `table`, in insertion order.
    #[must_use]
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.items.clone())
            .unwrap_or_default()
    }

    /// Store `item` directly, bypassing the call log.
    pub fn insert(&self, table: &str, item: Item) {
        if let Some(t) = self.tables.lock().get_mut(table) {
            t.put(item);
        }
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Operations of every call received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.calls.lock().iter().map(Call::operation).collect()
    }

    /// The last call received.
    #[must_use]
    pub fn last_call(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: StoreError) {
        *self.failure.lock() = Some(err);
    }

    /// Serve at most `limit` keys per batch get; the rest come back
    /// unprocessed.
    pub fn limit_batch_gets(&self, limit: usize) {
        *self.batch_get_limit.lock() = Some(limit);
    }

    fn record(&self, call: Call) -> Result<(), StoreError> {
        tracing::debug!(operation = %call.operation(), "memory transport call");
        self.calls.lock().push(call);
        match self.failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_table<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Table) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut tables = self.tables.lock();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| StoreError::resource_not_found(format!("table {name} not found")))?;
        f(table)
    }
}

/// Apply `SET #a = :a, #b = :b` to `item`.
fn apply_set(item: &mut Item, input: &UpdateItemInput) -> Result<(), StoreError> {
    let expression = input.update_expression.as_deref().unwrap_or_default();
    let assignments = expression
        .strip_prefix("SET ")
        .ok_or_else(|| StoreError::validation(format!("unsupported update: {expression}")))?;
    for assignment in assignments.split(", ") {
        let (name, value) = assignment
            .split_once(" = ")
            .ok_or_else(|| StoreError::validation(format!("bad assignment: {assignment}")))?;
        let name = input
            .expression_attribute_names
            .get(name)
            .ok_or_else(|| StoreError::validation(format!("unbound name {name}")))?;
        let value = input
            .expression_attribute_values
            .get(value)
            .ok_or_else(|| StoreError::validation(format!("unbound value {value}")))?;
        item.insert(name.clone(), value.clone());
    }
    Ok(())
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, StoreError> {
        self.record(Call::GetItem(input.clone()))?;
        self.with_table(&input.table_name, |t| {
            Ok(GetItemOutput {
                item: t.position(&input.key).map(|i| t.items[i].clone()),
            })
        })
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, StoreError> {
        self.record(Call::PutItem(input.clone()))?;
        self.with_table(&input.table_name, |t| {
            t.put(input.item);
            Ok(PutItemOutput::default())
        })
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, StoreError> {
        self.record(Call::UpdateItem(input.clone()))?;
        self.with_table(&input.table_name, |t| {
            let mut item = t
                .position(&input.key)
                .map_or_else(|| input.key.clone(), |i| t.items[i].clone());
            apply_set(&mut item, &input)?;
            t.put(item);
            Ok(UpdateItemOutput::default())
        })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, StoreError> {
        self.record(Call::DeleteItem(input.clone()))?;
        self.with_table(&input.table_name, |t| {
            t.delete(&input.key);
            Ok(DeleteItemOutput::default())
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, StoreError> {
        self.record(Call::Scan(input.clone()))?;
        self.with_table(&input.table_name, |t| {
            let (items, last_evaluated_key) = t.page(&input.exclusive_start_key, input.limit);
            Ok(ScanOutput {
                items,
                last_evaluated_key,
            })
        })
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, StoreError> {
        self.record(Call::Query(input.clone()))?;
        self.with_table(&input.table_name, |t| {
            let (items, last_evaluated_key) = t.page(&input.exclusive_start_key, input.limit);
            Ok(QueryOutput {
                items,
                last_evaluated_key,
            })
        })
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, StoreError> {
        self.record(Call::BatchGetItem(input.clone()))?;
        let limit = *self.batch_get_limit.lock();
        let mut output = BatchGetItemOutput::default();
        for (table, mut request) in input.request_items {
            let served = limit.unwrap_or(request.keys.len()).min(request.keys.len());
            let rest = request.keys.split_off(served);
            let items = self.with_table(&table, |t| {
                Ok(request
                    .keys
                    .iter()
                    .filter_map(|key| t.position(key).map(|i| t.items[i].clone()))
                    .collect::<Vec<_>>())
            })?;
            output.responses.insert(table.clone(), items);
            if !rest.is_empty() {
                request.keys = rest;
                output.unprocessed_keys.insert(table, request);
            }
        }
        Ok(output)
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, StoreError> {
        self.record(Call::BatchWriteItem(input.clone()))?;
        for (table, requests) in input.request_items {
            self.with_table(&table, |t| {
                for request in requests {
                    if let Some(put) = request.put_request {
                        t.put(put.item);
                    } else if let Some(delete) = request.delete_request {
                        t.delete(&delete.key);
                    }
                }
                Ok(())
            })?;
        }
        Ok(BatchWriteItemOutput::default())
    }
}

/// Shorthand for a string attribute.
#[must_use]
pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_owned())
}
