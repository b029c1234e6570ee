//! Simple example serving the record API over an in-memory store
//!
//! ```text
//! cargo run --example simple_api
//! curl -H 'X-User-Id: 1' 'http://127.0.0.1:8080/V8/module/Accounts?page[size]=2&sort=name'
//! ```
//!
//! Set `RECORDS_CONFIG` to load module schemas from a YAML file instead of
//! the built-in defaults (see `records.yaml` next to this file).

use std::sync::Arc;

use records::prelude::*;
use tower_http::cors::CorsLayer;

async fn seed(store: &InMemoryRecordStore) -> Result<()> {
    let accounts = [
        ("Acme Corp", "Manufacturing", 250),
        ("Globex", "Energy", 1200),
        ("Initech", "Software", 80),
    ];

    for (name, industry, employees) in accounts {
        let mut record = Record::new("Accounts");
        record.set("name", FieldValue::String(name.to_string()));
        record.set("industry", FieldValue::String(industry.to_string()));
        record.set("employees", FieldValue::Integer(employees));
        store.persist(&mut record, Some("1")).await?;
        println!("✅ Seeded account {} ({})", name, record.id_str());

        // Attachment target sharing the account id
        let mut note = Record::new("Notes");
        note.id = record.id.clone();
        note.new_with_id = true;
        note.set("name", FieldValue::String(format!("{} contract", name)));
        note.set("parent_type", FieldValue::String("Accounts".to_string()));
        note.set("parent_id", FieldValue::String(record.id_str().to_string()));
        store.persist(&mut note, Some("1")).await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    records::init_tracing();

    let config = match std::env::var("RECORDS_CONFIG") {
        Ok(path) => ServiceConfig::from_yaml_file(&path)?,
        Err(_) => ServiceConfig::default_config(),
    };

    let store = InMemoryRecordStore::new();
    seed(&store).await?;

    println!("\n🚀 Record API on http://127.0.0.1:8080");
    println!("   modules: Accounts, Contacts, Notes\n");

    ServerBuilder::new()
        .with_config(config)
        .with_shared_store(Arc::new(store))
        .with_cors(CorsLayer::permissive())
        .serve("127.0.0.1:8080")
        .await
}
