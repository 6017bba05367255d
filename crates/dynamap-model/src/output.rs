//! Responses a store transport returns to the mapper.
//!
//! Collections missing from a response body deserialize as empty.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Item, Key, KeysAndAttributes, WriteRequest};

/// Response to `GetItem`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemOutput {
    /// `None` when no item has the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

/// Response to `PutItem`. The mapper never asks for old values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutItemOutput {}

/// Response to `UpdateItem`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItemOutput {}

/// Response to `DeleteItem`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteItemOutput {}

/// One page of a `Query` or `Scan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemPage {
    /// Items of this page.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Key of the last item read; empty on the last page. Pass it back as
    /// `ExclusiveStartKey` to continue.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Key,
}

/// Response to `Query`.
pub type QueryOutput = ItemPage;

/// Response to `Scan`.
pub type ScanOutput = ItemPage;

/// Response to `BatchGetItem`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemOutput {
    /// Items read, per table, in store order.
    #[serde(default)]
    pub responses: HashMap<String, Vec<Item>>,
    /// Keys left for a retry.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

/// Response to `BatchWriteItem`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemOutput {
    /// Requests left for a retry.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}
