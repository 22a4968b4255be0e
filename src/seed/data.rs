use crate::model::{Table, TableAggregate, TableSchema};
use crate::store::traits::Store;
use anyhow::Result;
use serde_json::{json, Map, Value};

const DEMO_USER: &str = "demo-user";

fn demo_row(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Load demonstration tables for the demo user. Enabled with
/// LOAD_SEED_DATA=true; intended for local development only.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let table = Table::new(
        DEMO_USER.to_string(),
        "Monthly Expenses".to_string(),
        Some("Day-to-day spending, one row per purchase".to_string()),
    );
    let mut expenses = TableAggregate::new(
        table,
        TableSchema::new(vec![
            "Date".to_string(),
            "Category".to_string(),
            "Amount".to_string(),
            "Vendor".to_string(),
        ]),
    );
    for row in [
        json!({"Date": "2024-01-03", "Category": "Groceries", "Amount": 54.20, "Vendor": "Corner Market"}),
        json!({"Date": "2024-01-05", "Category": "Transport", "Amount": 2.75, "Vendor": "Metro"}),
        json!({"Date": "2024-01-09", "Category": "Dining", "Amount": 18.00, "Vendor": "Noodle Bar"}),
    ] {
        expenses
            .insert_row(demo_row(row))
            .map_err(|e| anyhow::anyhow!("seed row rejected: {e}"))?;
    }
    store.put_aggregate(expenses).await?;

    let table = Table::new(
        DEMO_USER.to_string(),
        "Subscriptions".to_string(),
        Some("Recurring charges to keep an eye on".to_string()),
    );
    let mut subscriptions = TableAggregate::new(
        table,
        TableSchema::new(vec![
            "Service".to_string(),
            "Monthly Cost".to_string(),
            "Renewal Day".to_string(),
        ]),
    );
    for row in [
        json!({"Service": "Streaming", "Monthly Cost": 12.99, "Renewal Day": 14}),
        json!({"Service": "Cloud storage", "Monthly Cost": 1.99, "Renewal Day": 1}),
    ] {
        subscriptions
            .insert_row(demo_row(row))
            .map_err(|e| anyhow::anyhow!("seed row rejected: {e}"))?;
    }
    store.put_aggregate(subscriptions).await?;

    log::info!("seed data loaded for '{DEMO_USER}'");
    Ok(())
}
