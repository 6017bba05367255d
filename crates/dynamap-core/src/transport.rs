//! The store transport seam.
//!
//! The mapper never talks to a network itself; it issues exactly one call on
//! a [`Transport`] per operation and propagates the returned [`StoreError`]
//! unchanged. Retries, timeouts and connection handling belong to the
//! implementation.
//!
//! The trait uses `#[async_trait]` so it stays object-safe; the mapper holds
//! it as `Arc<dyn Transport>`.

use dynamap_model::StoreError;
use dynamap_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, UpdateItemInput,
};
use dynamap_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, UpdateItemOutput,
};

/// A partition/sort-key addressed item store.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Read one item.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, StoreError>;

    /// Write one item, replacing any existing item with the same key.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, StoreError>;

    /// Apply an update expression to one item.
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, StoreError>;

    /// Delete one item.
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, StoreError>;

    /// Read a page of items from the whole table.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, StoreError>;

    /// Read a page of items matching a key condition.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, StoreError>;

    /// Read several items by key.
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, StoreError>;

    /// Put and delete several items. Not atomic.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, StoreError>;
}
