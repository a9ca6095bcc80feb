//! `describe(table_set) -> map<table, map<column, datatype>>`, fanned
//! out over a bounded worker pool. Failures are non-fatal: a table that
//! fails to describe is simply absent from the returned map.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::client::SchemaSourceTransport;

pub type TableSchema = BTreeMap<String, String>;

pub async fn describe(
    transport: &SchemaSourceTransport,
    tables: &[String],
) -> BTreeMap<String, TableSchema> {
    let semaphore = Arc::new(Semaphore::new(transport.max_workers()));
    let mut handles = Vec::with_capacity(tables.len());

    for table in tables {
        let transport = transport.clone();
        let table = table.clone();
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let result = transport.describe_table(&table).await;
            (table, result)
        }));
    }

    let mut schemas = BTreeMap::new();
    for handle in handles {
        let Ok((table, result)) = handle.await else {
            continue;
        };
        match result {
            Ok(columns) => {
                schemas.insert(table, columns.into_iter().collect());
            }
            Err(error) => {
                warn!(table, error = %error, "schema enrichment: describe failed, table omitted from schema map");
            }
        }
    }
    schemas
}
