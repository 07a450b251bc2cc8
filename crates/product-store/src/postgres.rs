use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    ProductRecord, Result, Sku, StoreError, Version,
    store::{ExpectedVersion, ProductStore, validate_record_for_put},
};

/// PostgreSQL-backed product store.
///
/// The `products` table is used as a key-value table: the sku is the key,
/// the JSONB document is the value and the `version` column is the token
/// every conditional write is checked against.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<ProductRecord> {
        let document: serde_json::Value = row.try_get("document")?;
        let mut record = ProductRecord::from_document(document)?;
        // The column is what writes are conditioned on, so it wins over the document.
        record.version = Version::new(row.try_get("version")?);
        Ok(record)
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[tracing::instrument(skip(self), fields(sku = %sku))]
    async fn get(&self, sku: &Sku) -> Result<Option<ProductRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT sku, version, document
            FROM products
            WHERE sku = $1
            "#,
        )
        .bind(sku.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    #[tracing::instrument(skip(self, record), fields(sku = %record.sku, version = %record.version))]
    async fn put(&self, record: ProductRecord, expected: ExpectedVersion) -> Result<Version> {
        validate_record_for_put(&record, expected)?;

        let document = record.to_document()?;

        let result = match expected {
            ExpectedVersion::Absent => {
                sqlx::query(
                    r#"
                    INSERT INTO products (sku, version, document)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (sku) DO NOTHING
                    "#,
                )
                .bind(record.sku.as_str())
                .bind(record.version.as_i64())
                .bind(&document)
                .execute(&self.pool)
                .await?
            }
            ExpectedVersion::Exact(current) => {
                sqlx::query(
                    r#"
                    UPDATE products
                    SET version = $2, document = $3, updated_at = NOW()
                    WHERE sku = $1 AND version = $4
                    "#,
                )
                .bind(record.sku.as_str())
                .bind(record.version.as_i64())
                .bind(&document)
                .bind(current.as_i64())
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            metrics::counter!("store_conflicts_total").increment(1);
            let actual = self.version(&record.sku).await?;
            tracing::debug!(%expected, ?actual, "conditional write rejected");
            return Err(StoreError::ConcurrencyConflict {
                sku: record.sku,
                expected,
                actual,
            });
        }

        metrics::counter!("store_writes_total").increment(1);
        Ok(record.version)
    }

    async fn list(&self) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT sku, version, document
            FROM products
            ORDER BY sku ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn version(&self, sku: &Sku) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM products WHERE sku = $1")
                .bind(sku.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
