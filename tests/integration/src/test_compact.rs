//! Mapper tests over compact models.

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use dynamap_core::codec::COMPACT_ATTRIBUTE;
    use dynamap_core::{
        FieldShape, MapperConfig, MapperError, ModelOptions, RecordShape, Repository,
        SchemaNode, Transport,
    };
    use dynamap_model::{AttributeValue, Item, StoreOperation};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use crate::{Call, MemoryTransport, init_tracing, s};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
        zip: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: String,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderLine {
        sku: String,
        qty: u32,
    }

    fn profile_schema() -> SchemaNode {
        SchemaNode::object([
            ("name", SchemaNode::String),
            ("age", SchemaNode::Number),
            (
                "address",
                SchemaNode::object([("city", SchemaNode::String), ("zip", SchemaNode::String)])
                    .optional(),
            ),
        ])
    }

    fn ada() -> Profile {
        Profile {
            name: "Ada Lovelace".to_owned(),
            age: 36,
            address: Some(Address {
                city: "London".to_owned(),
                zip: "NW1".to_owned(),
            }),
        }
    }

    fn setup() -> (Arc<MemoryTransport>, Repository) {
        init_tracing();
        let transport = MemoryTransport::with_tables(&[
            ("dev_PROFILES", &["PK", "SK"]),
            ("dev_ACCOUNTS", &["id"]),
            ("dev_ORDERS", &["PK", "SK"]),
        ]);
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        let config = MapperConfig::builder()
            .table_prefix("dev_".to_owned())
            .build();
        (transport, Repository::new(config, dyn_transport))
    }

    fn profiles(repo: &Repository) -> dynamap_core::Mapper<Profile> {
        repo.define::<Profile>(
            profile_schema(),
            ModelOptions::model()
                .keys("PK", "SK")
                .default_sort_key("PROFILE"),
        )
        .unwrap()
    }

    fn order_lines(repo: &Repository) -> dynamap_core::Mapper<OrderLine> {
        repo.register::<OrderLine>(
            ModelOptions::model()
                .table("ORDERS")
                .keys("PK", "SK")
                .shape(RecordShape::repeated(vec![
                    FieldShape::from("sku"),
                    FieldShape::from("qty"),
                ])),
        )
        .unwrap()
    }

    fn packed(item: &Item) -> &str {
        item[COMPACT_ATTRIBUTE].as_s().unwrap()
    }

    #[tokio::test]
    async fn test_should_store_only_keys_and_packed_value() -> anyhow::Result<()> {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        assert_eq!(profiles.table(), "dev_PROFILES");

        profiles.put_with_keys(&ada(), "u1").await?;

        let stored = &transport.items("dev_PROFILES")[0];
        let attrs: BTreeSet<_> = stored.keys().map(String::as_str).collect();
        assert_eq!(attrs, BTreeSet::from(["PK", "SK", "V"]));
        assert_eq!(stored["PK"], s("u1"));
        assert_eq!(stored["SK"], s("PROFILE"));
        assert_eq!(packed(stored), "['Ada Lovelace',36,['London','NW1']]");

        let found = profiles.get("u1").await?.expect("stored profile");
        assert_eq!(found.record(), &ada());
        assert_eq!(found.sk(), Some(&s("PROFILE")));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_pack_absent_group_as_null() {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        let mut bob = ada();
        bob.name = "Bob".to_owned();
        bob.address = None;

        profiles.put_with_keys(&bob, ("u2", "v1")).await.unwrap();

        let stored = &transport.items("dev_PROFILES")[0];
        assert_eq!(packed(stored), "['Bob',36,N]");
        let found = profiles.get(("u2", "v1")).await.unwrap().unwrap();
        assert_eq!(found.into_inner(), bob);
    }

    #[tokio::test]
    async fn test_should_reattach_declared_key_fields() {
        let (transport, repo) = setup();
        let accounts = repo
            .define::<Account>(
                SchemaNode::object([("id", SchemaNode::String), ("name", SchemaNode::String)]),
                ModelOptions::model().partition_key("id"),
            )
            .unwrap();
        let account = Account {
            id: "a1".to_owned(),
            name: "Ada".to_owned(),
        };

        accounts.put(&account).await.unwrap();

        let stored = &transport.items("dev_ACCOUNTS")[0];
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["id"], s("a1"));
        assert_eq!(packed(stored), "[N,'Ada']");

        let found = accounts.get("a1").await.unwrap().unwrap();
        assert_eq!(found.into_inner(), account);
    }

    #[tokio::test]
    async fn test_should_expand_list_rows() {
        let (transport, repo) = setup();
        let lines = order_lines(&repo);
        let line = OrderLine {
            sku: "sku-1".to_owned(),
            qty: 10,
        };

        lines
            .put_list(&[line.clone(), line.clone()], ("o1", "LINES"))
            .await
            .unwrap();
        let stored = &transport.items("dev_ORDERS")[0];
        assert_eq!(packed(stored), "[['sku-1',10],[^0,^1]]");

        let rows = lines.get_list(("o1", "LINES")).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.record() == &line));
        assert!(rows.iter().all(|r| r.pk() == Some(&s("o1"))));

        let scanned = lines.scan().await.unwrap();
        assert_eq!(scanned.len(), 2);

        let err = lines.get(("o1", "LINES")).await.unwrap_err();
        assert!(matches!(err, MapperError::Configuration(_)));
        let err = lines.put(&line).await.unwrap_err();
        assert!(matches!(err, MapperError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_should_rewrite_packed_value_on_full_update() {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        profiles.put_with_keys(&ada(), "u1").await.unwrap();

        profiles
            .update(
                &json!({"name": "Ada King", "age": 37, "address": {"city": "London", "zip": "NW1"}}),
                "u1",
            )
            .await
            .unwrap();

        let Some(Call::UpdateItem(input)) = transport.last_call() else {
            panic!("expected an UpdateItem call");
        };
        assert_eq!(input.update_expression.as_deref(), Some("SET #V = :V"));
        assert_eq!(input.expression_attribute_names["#V"], COMPACT_ATTRIBUTE);
        assert_eq!(
            input.expression_attribute_values[":V"],
            s("['Ada King',37,['London','NW1']]")
        );

        let found = profiles.get("u1").await.unwrap().unwrap();
        assert_eq!(found.name, "Ada King");
        assert_eq!(found.address, ada().address);
    }

    #[tokio::test]
    async fn test_should_reject_partial_update_of_packed_value() {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        profiles.put_with_keys(&ada(), "u1").await.unwrap();

        let err = profiles
            .update(&json!({"name": "Ada King", "age": 37}), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::Configuration(_)));
        assert!(err.to_string().contains("missing address"));
        assert_eq!(transport.operations(), vec![StoreOperation::PutItem]);

        let found = profiles.get("u1").await.unwrap().unwrap();
        assert_eq!(found.record(), &ada());
    }

    #[tokio::test]
    async fn test_should_refuse_update_of_list_rows() {
        let (transport, repo) = setup();
        let lines = order_lines(&repo);
        let line = OrderLine {
            sku: "sku-1".to_owned(),
            qty: 10,
        };
        lines
            .put_list(&[line.clone(), line.clone()], ("o1", "LINES"))
            .await
            .unwrap();
        let before = packed(&transport.items("dev_ORDERS")[0]).to_owned();

        let err = lines
            .update(&json!({"sku": "sku-1", "qty": 11}), ("o1", "LINES"))
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::Configuration(_)));
        assert_eq!(packed(&transport.items("dev_ORDERS")[0]), before);

        let rows = lines.get_list(("o1", "LINES")).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.qty == 10));
    }

    #[tokio::test]
    async fn test_should_read_plain_items_in_compact_table() {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        profiles.put_with_keys(&ada(), "u1").await.unwrap();
        transport.insert(
            "dev_PROFILES",
            HashMap::from([
                ("PK".to_owned(), s("u2")),
                ("SK".to_owned(), s("PROFILE")),
                ("name".to_owned(), s("Bob")),
                ("age".to_owned(), AttributeValue::N("40".to_owned())),
            ]),
        );

        let all = profiles.scan().await.unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Ada Lovelace", "Bob"]);
        assert_eq!(all[1].age, 40);
    }

    #[tokio::test]
    async fn test_should_surface_malformed_packed_value() {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        transport.insert(
            "dev_PROFILES",
            HashMap::from([
                ("PK".to_owned(), s("u1")),
                ("SK".to_owned(), s("PROFILE")),
                (COMPACT_ATTRIBUTE.to_owned(), s("['Ada'")),
            ]),
        );

        let err = profiles.get("u1").await.unwrap_err();
        assert!(matches!(err, MapperError::Codec(_)));
        assert!(err.is_local());
        assert_eq!(transport.operations(), vec![StoreOperation::GetItem]);
    }

    #[tokio::test]
    async fn test_should_keep_cursor_when_page_fails_to_decode() {
        let (transport, repo) = setup();
        let profiles = profiles(&repo);
        profiles.put_with_keys(&ada(), "u1").await.unwrap();
        transport.insert(
            "dev_PROFILES",
            HashMap::from([
                ("PK".to_owned(), s("u2")),
                ("SK".to_owned(), s("PROFILE")),
                (COMPACT_ATTRIBUTE.to_owned(), s("[[[")),
            ]),
        );
        profiles.put_with_keys(&ada(), "u3").await.unwrap();

        let page = profiles
            .scoped(|q| {
                q.limit(1);
            })
            .scan_page()
            .await
            .unwrap();
        let cursor = page.last_evaluated_key.unwrap();
        assert_eq!(cursor["PK"], s("u1"));

        let err = profiles
            .scoped(|q| {
                q.limit(1).exclusive_start_key(cursor.clone());
            })
            .scan_page()
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::Codec(_)));
        assert_eq!(profiles.last_evaluated_key(), Some(cursor));
    }

    #[tokio::test]
    async fn test_should_require_shape_for_compact_model() {
        let (_, repo) = setup();
        let err = repo
            .register::<Account>(ModelOptions::model())
            .unwrap_err();
        assert!(matches!(err, MapperError::Configuration(_)));
    }
}
