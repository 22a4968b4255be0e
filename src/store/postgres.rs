use anyhow::{Context, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row as SqlxRow, Transaction};

use crate::model::{Id, Row, Table, TableAggregate, TableSchema};
use crate::store::traits::{ContentStore, TableStore};

/// PostgreSQL-backed store.
///
/// Durable layout: one metadata record, one schema record (headers as an
/// ordered JSONB list) and N row records (JSONB document plus stable
/// row_id) per table. Every trait method that writes runs in one
/// transaction so schema and row effects always land together.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the durable layout if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tables (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                owner_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                modified_at TIMESTAMPTZ NOT NULL,
                pending_count BIGINT NOT NULL DEFAULT 0,
                is_shared BOOLEAN NOT NULL DEFAULT FALSE,
                shared_with JSONB NOT NULL DEFAULT '[]'::jsonb
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create tables table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS table_schemas (
                table_id TEXT PRIMARY KEY REFERENCES tables(id) ON DELETE CASCADE,
                headers JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create table_schemas table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS table_rows (
                row_id TEXT PRIMARY KEY,
                table_id TEXT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
                position BIGINT NOT NULL,
                data JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create table_rows table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_table_rows_table ON table_rows(table_id, position)")
            .execute(&self.pool)
            .await
            .context("Failed to create row index")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tables_owner ON tables(owner_id)")
            .execute(&self.pool)
            .await
            .context("Failed to create owner index")?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table_from_row(row: &PgRow) -> Result<Table> {
        let shared_with: serde_json::Value = row.get("shared_with");
        let shared_with: Vec<Id> =
            serde_json::from_value(shared_with).context("Malformed shared_with column")?;

        Ok(Table {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            owner_id: row.get("owner_id"),
            created_at: row.get("created_at"),
            modified_at: row.get("modified_at"),
            pending_count: row.get("pending_count"),
            is_shared: row.get("is_shared"),
            shared_with,
        })
    }

    async fn upsert_table_tx(tx: &mut Transaction<'_, Postgres>, table: &Table) -> Result<()> {
        let shared_with =
            serde_json::to_value(&table.shared_with).context("Failed to encode shared_with")?;
        sqlx::query(
            r#"
            INSERT INTO tables (id, name, description, owner_id, created_at, modified_at, pending_count, is_shared, shared_with)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                modified_at = EXCLUDED.modified_at,
                pending_count = EXCLUDED.pending_count,
                is_shared = EXCLUDED.is_shared,
                shared_with = EXCLUDED.shared_with
            "#,
        )
        .bind(&table.id)
        .bind(&table.name)
        .bind(&table.description)
        .bind(&table.owner_id)
        .bind(table.created_at)
        .bind(table.modified_at)
        .bind(table.pending_count)
        .bind(table.is_shared)
        .bind(shared_with)
        .execute(&mut **tx)
        .await
        .context("Failed to upsert table record")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl TableStore for PostgresStore {
    async fn get_table(&self, id: &Id) -> Result<Option<Table>> {
        let row = sqlx::query("SELECT id, name, description, owner_id, created_at, modified_at, pending_count, is_shared, shared_with FROM tables WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch table")?;

        row.as_ref().map(Self::table_from_row).transpose()
    }

    async fn list_tables_for_owner(&self, owner_id: &str) -> Result<Vec<Table>> {
        let rows = sqlx::query("SELECT id, name, description, owner_id, created_at, modified_at, pending_count, is_shared, shared_with FROM tables WHERE owner_id = $1 ORDER BY created_at DESC")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tables for owner")?;

        rows.iter().map(Self::table_from_row).collect()
    }

    async fn list_tables_shared_with(&self, principal_id: &str) -> Result<Vec<Table>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, owner_id, created_at, modified_at, pending_count, is_shared, shared_with
            FROM tables
            WHERE shared_with @> jsonb_build_array($1::text)
            ORDER BY created_at DESC
            "#,
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list shared tables")?;

        rows.iter().map(Self::table_from_row).collect()
    }

    async fn search_tables(&self, owner_id: &str, text: &str) -> Result<Vec<Table>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, owner_id, created_at, modified_at, pending_count, is_shared, shared_with
            FROM tables
            WHERE owner_id = $1
              AND (name ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%')
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .bind(text)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search tables")?;

        rows.iter().map(Self::table_from_row).collect()
    }

    async fn upsert_table(&self, table: Table) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;
        Self::upsert_table_tx(&mut tx, &table).await?;
        tx.commit().await.context("Failed to commit table upsert")?;
        Ok(())
    }

    async fn delete_table(&self, id: &Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        // Children before parent, all in one transaction, so concurrent
        // readers never see orphaned rows mid-deletion.
        sqlx::query("DELETE FROM table_rows WHERE table_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete rows")?;
        sqlx::query("DELETE FROM table_schemas WHERE table_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete schema")?;
        let result = sqlx::query("DELETE FROM tables WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete table record")?;

        tx.commit().await.context("Failed to commit table deletion")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl ContentStore for PostgresStore {
    async fn get_aggregate(&self, table_id: &Id) -> Result<Option<TableAggregate>> {
        // Single transaction for a consistent snapshot across the three
        // relations.
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        let table_row = sqlx::query("SELECT id, name, description, owner_id, created_at, modified_at, pending_count, is_shared, shared_with FROM tables WHERE id = $1")
            .bind(table_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch table")?;

        let Some(table_row) = table_row else {
            return Ok(None);
        };
        let table = Self::table_from_row(&table_row)?;

        let schema_row = sqlx::query("SELECT headers FROM table_schemas WHERE table_id = $1")
            .bind(table_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch schema")?;

        let headers: Vec<String> = match schema_row {
            Some(row) => {
                let value: serde_json::Value = row.get("headers");
                serde_json::from_value(value).context("Malformed headers column")?
            }
            None => Vec::new(),
        };

        let row_records = sqlx::query(
            "SELECT row_id, data FROM table_rows WHERE table_id = $1 ORDER BY position",
        )
        .bind(table_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to fetch rows")?;

        tx.commit().await.context("Failed to commit snapshot read")?;

        let mut rows = Vec::with_capacity(row_records.len());
        for record in row_records {
            let data: serde_json::Value = record.get("data");
            let serde_json::Value::Object(data) = data else {
                anyhow::bail!("Row document is not a JSON object");
            };
            rows.push(Row {
                row_id: record.get("row_id"),
                data,
            });
        }

        Ok(Some(TableAggregate {
            table,
            schema: TableSchema::new(headers),
            rows,
        }))
    }

    async fn put_aggregate(&self, aggregate: TableAggregate) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        Self::upsert_table_tx(&mut tx, &aggregate.table).await?;

        let headers = serde_json::to_value(&aggregate.schema.headers)
            .context("Failed to encode headers")?;
        sqlx::query(
            r#"
            INSERT INTO table_schemas (table_id, headers)
            VALUES ($1, $2)
            ON CONFLICT (table_id) DO UPDATE SET headers = EXCLUDED.headers
            "#,
        )
        .bind(&aggregate.table.id)
        .bind(headers)
        .execute(&mut *tx)
        .await
        .context("Failed to upsert schema record")?;

        // Full row rewrite: column mutations touch every row, and the
        // replacement must land atomically with the header change.
        sqlx::query("DELETE FROM table_rows WHERE table_id = $1")
            .bind(&aggregate.table.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear rows")?;

        for (position, row) in aggregate.rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO table_rows (row_id, table_id, position, data) VALUES ($1, $2, $3, $4)",
            )
            .bind(&row.row_id)
            .bind(&aggregate.table.id)
            .bind(position as i64)
            .bind(serde_json::Value::Object(row.data.clone()))
            .execute(&mut *tx)
            .await
            .context("Failed to insert row record")?;
        }

        tx.commit().await.context("Failed to commit aggregate write")?;
        Ok(())
    }

    async fn insert_row(&self, table: &Table, row: &Row) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        Self::upsert_table_tx(&mut tx, table).await?;
        sqlx::query(
            r#"
            INSERT INTO table_rows (row_id, table_id, position, data)
            SELECT $1, $2, COALESCE(MAX(position) + 1, 0), $3
            FROM table_rows WHERE table_id = $2
            "#,
        )
        .bind(&row.row_id)
        .bind(&table.id)
        .bind(serde_json::Value::Object(row.data.clone()))
        .execute(&mut *tx)
        .await
        .context("Failed to insert row")?;

        tx.commit().await.context("Failed to commit row insert")?;
        Ok(())
    }

    async fn update_row(&self, table: &Table, row: &Row) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        Self::upsert_table_tx(&mut tx, table).await?;
        let result = sqlx::query("UPDATE table_rows SET data = $1 WHERE row_id = $2 AND table_id = $3")
            .bind(serde_json::Value::Object(row.data.clone()))
            .bind(&row.row_id)
            .bind(&table.id)
            .execute(&mut *tx)
            .await
            .context("Failed to update row")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("row '{}' not present in table '{}'", row.row_id, table.id);
        }

        tx.commit().await.context("Failed to commit row update")?;
        Ok(())
    }

    async fn delete_row(&self, table: &Table, row_id: &Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        Self::upsert_table_tx(&mut tx, table).await?;
        let result = sqlx::query("DELETE FROM table_rows WHERE row_id = $1 AND table_id = $2")
            .bind(row_id)
            .bind(&table.id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete row")?;

        tx.commit().await.context("Failed to commit row deletion")?;
        Ok(result.rows_affected() > 0)
    }
}
