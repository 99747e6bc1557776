//! Schema registry, write path and aggregation configs against SQLite.

#[allow(unused)]
mod support;

use serde_json::json;
use struct_search::schema::{SchemaDefinition, SchemaRegistry};
use struct_search::storage::{AccessTableLookup, AccessTablePage};
use struct_search::{AggregationConfig, DynamicParameters, Error, FilterContext, SearchSettings};
use support::*;

// ============================================================================
// SCHEMA REGISTRY
// ============================================================================

#[tokio::test]
async fn saved_schemas_load_back_with_types() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    db.import_schema(products()).await?;

    let schema = db.schema("products").await?;
    assert!(schema.is_lookup());
    let labels: Vec<_> = schema.columns().map(|c| c.label().to_string()).collect();
    assert_eq!(labels, ["name", "price", "released", "tags"]);
    assert!(schema.find_column("TAGS").is_some_and(|c| c.is_multi()));

    let exported = SchemaDefinition::from_schema(&schema)?;
    assert_eq!(exported.columns[1].class, "Decimal");
    assert_eq!(exported.columns[1].config["postfix"], " EUR");

    assert_eq!(db.registry.schema_names().await?, ["products"]);
    assert!(db.registry.load_schema("missing").await?.is_none());
    assert!(matches!(
        db.registry.require_schema("missing").await,
        Err(Error::SchemaNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn new_schema_versions_keep_column_positions() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    let v1 = db.import_schema(schema1()).await?;
    db.registry.assign("page01", "schema1").await?;
    db.save_page("schema1", "page01", NOW, json!({"first": "one", "third": "three"}))
        .await?;

    // drop `second`, reorder, add `fifth`
    let v2 = db
        .import_schema(json!({
            "schema": "schema1",
            "columns": [
                {"label": "third"},
                {"label": "first"},
                {"label": "fourth"},
                {"label": "fifth"}
            ]
        }))
        .await?;
    assert!(v2.id() > v1.id());

    let colref = |label: &str| v2.all_columns().iter().find(|c| c.label() == label).map(|c| c.colref());
    assert_eq!(colref("first"), Some(1));
    assert_eq!(colref("third"), Some(3));
    assert_eq!(colref("fourth"), Some(4));
    assert_eq!(colref("fifth"), Some(5));
    assert_eq!(colref("second"), Some(2));
    assert!(v2.find_column("second").is_none(), "removed columns are disabled");

    let mut search = db.search(&["schema1"]).await?;
    search.add_column("*");
    let rows = search.execute(&db.storage).await?;
    let labels: Vec<_> = search.columns().iter().map(|c| c.label().to_string()).collect();
    assert_eq!(labels, ["first", "third", "fourth", "fifth"]);
    assert_eq!(single(&rows[0][0]), "one");
    assert_eq!(single(&rows[0][1]), "three");
    assert!(rows[0][3].is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_definitions_are_rejected() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    for definition in [
        json!({"schema": "Bad Name", "columns": []}),
        json!({"schema": "dup", "columns": [{"label": "a"}, {"label": "A"}]}),
        json!({"schema": "reserved", "columns": [{"label": "%pageid%"}]}),
        json!({"schema": "dotted", "columns": [{"label": "a.b"}]}),
        json!({"schema": "typed", "columns": [{"label": "a", "class": "Wiki"}]}),
    ] {
        let definition: SchemaDefinition = serde_json::from_value(definition)?;
        let name = definition.schema.clone();
        let err = db.registry.save_schema(definition, "admin").await.unwrap_err();
        assert!(err.is_config(), "{name}: {err}");
    }
    assert!(db.registry.schema_names().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn assignments_are_listed_per_page() -> anyhow::Result<()> {
    let db = TestDb::seeded().await?;
    assert_eq!(
        db.registry.assigned_schemas("page01").await?,
        ["schema1", "schema2"]
    );
    assert_eq!(db.registry.assigned_schemas("page15").await?, ["schema2"]);

    db.registry.unassign("page01", "schema2").await?;
    assert_eq!(db.registry.assigned_schemas("page01").await?, ["schema1"]);

    assert!(db.registry.assign("page01", "missing").await.is_err());
    Ok(())
}

// ============================================================================
// WRITE PATH
// ============================================================================

#[tokio::test]
async fn page_data_is_validated_before_storing() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    db.import_schema(schema1()).await?;
    let schema = db.schema("schema1").await?;
    let page = AccessTablePage::new(schema.clone(), "page01", NOW);

    let err = page
        .save_data(db.storage.pool(), &row(json!({"nope": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = page
        .save_data(db.storage.pool(), &row(json!({"first": ["a", "b"]})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = AccessTablePage::new(schema, "page01", 0)
        .save_data(db.storage.pool(), &row(json!({"first": "a"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(page.last_revision_timestamp(db.storage.pool()).await?, None);
    Ok(())
}

#[tokio::test]
async fn revisions_are_tracked_per_page() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    db.import_schema(schema1()).await?;
    db.save_page("schema1", "page01", NOW, json!({"first": "a"})).await?;
    db.save_page("schema1", "page01", NOW + 10, json!({"first": "b"}))
        .await?;

    let schema = db.schema("schema1").await?;
    let current = AccessTablePage::new(schema.clone(), "page01", 0);
    assert_eq!(
        current.last_revision_timestamp(db.storage.pool()).await?,
        Some(NOW + 10)
    );
    let past = AccessTablePage::new(schema, "page01", NOW + 5);
    assert_eq!(
        past.last_revision_timestamp(db.storage.pool()).await?,
        Some(NOW)
    );
    Ok(())
}

#[tokio::test]
async fn lookup_rows_are_searchable_without_assignment() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    let schema = db.import_schema(products()).await?;
    let access = AccessTableLookup::new(schema)?;
    let pool = db.storage.pool();

    let widget = access
        .save_row(
            pool,
            None,
            &row(json!({"name": "widget", "price": "9.50", "released": "2023-05-01", "tags": ["a", "b"]})),
        )
        .await?;
    let gadget = access
        .save_row(pool, None, &row(json!({"name": "gadget", "price": "120", "tags": ["c"]})))
        .await?;
    let gizmo = access
        .save_row(pool, None, &row(json!({"name": "gizmo", "price": "15"})))
        .await?;
    assert_eq!((widget, gadget, gizmo), (1, 2, 3));

    let err = access
        .save_row(pool, None, &row(json!({"price": "cheap"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let mut search = db.search(&["products"]).await?;
    search.add_column("name");
    search.add_column("price");
    search.add_column("tags");
    search.add_filter("price", "10", ">", "AND")?;
    search.add_sort("price", false);

    let rows = search.execute(&db.storage).await?;
    assert_eq!(first_cells(&rows), ["gadget", "gizmo"]);
    assert_eq!(rows[0][1].display(), "120 EUR");
    assert_eq!(multi(&rows[0][2]), vec!["c"]);
    assert!(rows[1][2].is_empty());
    assert_eq!(search.rids(), [gadget, gizmo]);
    assert_eq!(search.pids(), ["", ""]);

    access
        .save_row(pool, Some(gizmo), &row(json!({"name": "gizmo", "price": "5"})))
        .await?;
    access.delete_row(pool, gadget).await?;
    let rows = search.execute(&db.storage).await?;
    assert!(rows.is_empty());
    assert_eq!(search.count(&db.storage).await?, 0);
    Ok(())
}

#[tokio::test]
async fn page_schemas_are_not_lookups() -> anyhow::Result<()> {
    let db = TestDb::new().await?;
    let schema = db.import_schema(schema1()).await?;
    assert!(AccessTableLookup::new(schema).unwrap_err().is_config());
    Ok(())
}

// ============================================================================
// AGGREGATION CONFIGS
// ============================================================================

#[tokio::test]
async fn aggregation_config_runs_end_to_end() -> anyhow::Result<()> {
    let db = TestDb::seeded().await?;
    let config = AggregationConfig::from_json(
        r#"{
            "schemas": ["schema2 s"],
            "cols": ["%pageid%", "s.afirst"],
            "filter": [
                {"column": "%pageid%", "comparator": "~", "value": "$PAGE$*"},
                {"column": "afirst", "comparator": "!~", "value": "*15*"}
            ],
            "sort": ["^%pageid%"],
            "limit": 3,
            "offset": 1
        }"#,
    )?;

    let context = FilterContext::new("wiki:page1", "tester");
    let mut search = config
        .into_search(&db.registry, SearchSettings::default(), &context)
        .await?;

    let rows = search.execute(&db.storage).await?;
    assert_eq!(first_cells(&rows), ["page18", "page17", "page16"]);
    assert_eq!(single(&rows[0][1]), "page18 first data");
    // page10 to page19 without page15
    assert_eq!(search.count(&db.storage).await?, 9);
    Ok(())
}

#[tokio::test]
async fn reader_overrides_narrow_resort_and_page() -> anyhow::Result<()> {
    let db = TestDb::seeded().await?;
    let config = AggregationConfig::from_json(
        r#"{
            "schemas": ["schema2"],
            "cols": ["%pageid%"],
            "filter": [
                {"column": "%pageid%", "value": "page01"},
                {"column": "%pageid%", "comparator": "~", "value": "page1*", "combinator": "OR"}
            ],
            "sort": ["%pageid%"],
            "limit": 3
        }"#,
    )?;

    let mut dynamic = DynamicParameters::default();
    dynamic.set_filter("%pageid%", "!=", "page01");
    dynamic.set_sort("%pageid%", false);
    dynamic.set_offset(2);

    let context = FilterContext::new("start", "tester");
    let mut search = config
        .clone()
        .into_search_with(&db.registry, SearchSettings::default(), &context, &dynamic)
        .await?;
    let rows = search.execute(&db.storage).await?;
    assert_eq!(first_cells(&rows), ["page17", "page16", "page15"]);
    // the authored OR group as a whole is narrowed, page01 stays out
    assert_eq!(search.count(&db.storage).await?, 10);

    dynamic.remove_filter("%pageid%");
    let search = config
        .into_search_with(&db.registry, SearchSettings::default(), &context, &dynamic)
        .await?;
    assert_eq!(search.count(&db.storage).await?, 11);
    Ok(())
}

#[tokio::test]
async fn aggregation_config_defaults_to_all_columns() -> anyhow::Result<()> {
    let db = TestDb::seeded().await?;
    let config = AggregationConfig::from_json(r#"{"schemas": ["schema1"]}"#)?;
    let search = config
        .into_search(&db.registry, SearchSettings::default(), &FilterContext::new("x", "u"))
        .await?;
    assert_eq!(search.columns().len(), 4);

    let missing = AggregationConfig::from_json(r#"{"schemas": ["nope"]}"#)?;
    let err = missing
        .into_search(&db.registry, SearchSettings::default(), &FilterContext::new("x", "u"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaNotFound(_)));

    let empty = AggregationConfig::default();
    let err = empty
        .into_search(&db.registry, SearchSettings::default(), &FilterContext::new("x", "u"))
        .await
        .unwrap_err();
    assert!(err.is_config());
    Ok(())
}
