use serde_json::{json, Value as JsonValue};
use struct_search::storage::PageMeta;

use super::TestDb;

/// Revision timestamp used for all seeded page data.
pub const NOW: i64 = 1_700_000_000;

pub fn schema1() -> JsonValue {
    json!({
        "schema": "schema1",
        "columns": [
            {"label": "first"},
            {"label": "second", "ismulti": true},
            {"label": "third"},
            {"label": "fourth"}
        ]
    })
}

pub fn schema2() -> JsonValue {
    json!({
        "schema": "schema2",
        "columns": [
            {"label": "afirst"},
            {"label": "asecond", "ismulti": true},
            {"label": "athird"},
            {"label": "afourth"}
        ]
    })
}

/// A lookup schema mixing typed columns.
pub fn products() -> JsonValue {
    json!({
        "schema": "products",
        "lookup": true,
        "columns": [
            {"label": "name"},
            {"label": "price", "class": "Decimal", "config": {"postfix": " EUR"}},
            {"label": "released", "class": "Date"},
            {"label": "tags", "ismulti": true}
        ]
    })
}

fn schema2_data() -> JsonValue {
    json!({
        "afirst": "first data",
        "asecond": ["second data", "more data", "even more"],
        "athird": "third data",
        "afourth": "fourth data"
    })
}

/// `page01` and `test:document` carry both schemas, `page10` to `page20`
/// only `schema2`.
pub async fn seed_search_fixture(db: &TestDb) -> anyhow::Result<()> {
    db.import_schema(schema1()).await?;
    db.import_schema(schema2()).await?;

    for page in ["page01", "test:document"] {
        db.registry.assign(page, "schema1").await?;
        db.registry.assign(page, "schema2").await?;
    }

    db.set_meta(PageMeta {
        pid: "page01".to_string(),
        title: Some("TestTitle".to_string()),
        lastrev: NOW,
        lasteditor: "testuser".to_string(),
        lastsummary: "Summary".to_string(),
    })
    .await?;

    db.save_page(
        "schema1",
        "page01",
        NOW,
        json!({
            "first": "first data",
            "second": ["second data", "more data", "even more"],
            "third": "third data",
            "fourth": "fourth data"
        }),
    )
    .await?;
    db.save_page("schema2", "page01", NOW, schema2_data()).await?;

    db.save_page(
        "schema1",
        "test:document",
        NOW,
        json!({
            "first": "document first data",
            "second": ["second", "more"],
            "third": "",
            "fourth": "fourth data"
        }),
    )
    .await?;
    db.save_page("schema2", "test:document", NOW, schema2_data())
        .await?;

    for i in 10..=20 {
        let page = format!("page{i}");
        db.save_page(
            "schema2",
            &page,
            NOW,
            json!({
                "afirst": format!("{page} first data"),
                "asecond": [format!("{page} second data")],
                "athird": format!("{page} third data"),
                "afourth": format!("{page} fourth data")
            }),
        )
        .await?;
        db.registry.assign(&page, "schema2").await?;
    }
    Ok(())
}
