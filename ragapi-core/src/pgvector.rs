//! pgvector (PostgreSQL) vector store backend.
//!
//! Provides [`PgVectorStore`] which implements [`VectorStore`] using
//! [sqlx](https://docs.rs/sqlx) with the
//! [pgvector](https://github.com/pgvector/pgvector) PostgreSQL extension.
//!
//! # Prerequisites
//!
//! - PostgreSQL with the `pgvector` extension installed
//! - A role allowed to run `CREATE EXTENSION IF NOT EXISTS vector`, or the
//!   extension created ahead of time
//!
//! # Example
//!
//! ```rust,ignore
//! use ragapi_core::pgvector::PgVectorStore;
//!
//! let store = PgVectorStore::connect(&store_config, 1024).await?;
//! let id = store.insert("text", &embedding, "docs").await?;
//! let results = store.search(&query_embedding, Some("docs"), 5).await?;
//! ```

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::document::{Document, DocumentId, ScoredDocument};
use crate::error::{RagError, Result};
use crate::vectorstore::{SimilarityMetric, VectorStore, check_dimensions};

const BACKEND: &str = "pgvector";

/// Widest `vector` column pgvector can build an HNSW index over.
const HNSW_MAX_DIMENSIONS: usize = 2000;
/// pgvector's default and upper bound for `hnsw.ef_search`.
const HNSW_DEFAULT_EF_SEARCH: usize = 40;
const HNSW_MAX_EF_SEARCH: usize = 1000;

/// How one search walks the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPlan {
    /// Compare against every candidate row. Used for tag-filtered searches,
    /// where an HNSW walk would drop matches it filters out after the fact,
    /// and for `k` beyond what the index can return.
    Exact,
    /// Walk the HNSW index with a candidate list of at least `ef_search`.
    Approximate { ef_search: usize },
}

impl ScanPlan {
    /// Transaction-local setting that enforces the plan.
    fn setting(self) -> String {
        match self {
            ScanPlan::Exact => "SET LOCAL enable_indexscan = off".to_string(),
            ScanPlan::Approximate { ef_search } => format!("SET LOCAL hnsw.ef_search = {ef_search}"),
        }
    }
}

fn scan_plan(indexed: bool, filtered: bool, k: usize) -> ScanPlan {
    if !indexed || filtered || k > HNSW_MAX_EF_SEARCH {
        ScanPlan::Exact
    } else {
        ScanPlan::Approximate { ef_search: k.max(HNSW_DEFAULT_EF_SEARCH) }
    }
}

/// A [`VectorStore`] backed by PostgreSQL with the pgvector extension.
///
/// All documents live in one table with columns
/// `id`, `content`, `embedding` (`vector(D)`), `source_tag`, `created_at`.
/// Every statement checks a connection out of the pool and returns it when
/// the statement finishes or its future is dropped.
///
/// Columns of up to 2000 dimensions get an HNSW index, used for untagged
/// searches. Tag-filtered searches always scan exactly, so a rare tag is
/// never crowded out of the result by closer rows carrying other tags.
pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    dimensions: usize,
    metric: SimilarityMetric,
}

impl PgVectorStore {
    /// Connect using `config` and make sure the schema exists for `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StorageError`] if the connection fails, the schema
    /// cannot be created, or an existing table was created for a different
    /// dimension.
    pub async fn connect(config: &StoreConfig, dimensions: usize) -> Result<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            RagError::ConfigError("database_url is required for the pgvector store".to_string())
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await
            .map_err(Self::map_err)?;

        let store = Self::from_pool(pool, &config.table, dimensions, config.metric)?;
        store.ensure_schema().await?;
        info!(table = store.table(), dimensions, metric = %store.metric, "pgvector store ready");
        Ok(store)
    }

    /// Wrap an existing pool. Does not touch the schema; call
    /// [`ensure_schema`](Self::ensure_schema) if the table may be missing.
    pub fn from_pool(
        pool: PgPool,
        table: &str,
        dimensions: usize,
        metric: SimilarityMetric,
    ) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError("dimensions must be greater than zero".to_string()));
        }
        Ok(Self { pool, table: sanitize_table_name(table)?, dimensions, metric })
    }

    /// Create the extension, table and indexes if they are missing, and
    /// verify that an existing table matches this store's dimension.
    pub async fn ensure_schema(&self) -> Result<()> {
        let table = &self.table;
        let dimensions = self.dimensions;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                id UUID PRIMARY KEY, \
                content TEXT NOT NULL, \
                embedding vector({dimensions}) NOT NULL, \
                source_tag TEXT NOT NULL, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()\
            )"
        );
        sqlx::query(&create_sql).execute(&self.pool).await.map_err(Self::map_err)?;

        // For vector(n) columns pgvector stores n as the type modifier.
        let existing: i32 = sqlx::query_scalar(
            "SELECT atttypmod FROM pg_attribute \
             WHERE attrelid = $1::regclass AND attname = 'embedding'",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_err)?;
        if existing > 0 && existing as usize != dimensions {
            return Err(RagError::storage(
                BACKEND,
                format!("table '{table}' stores vector({existing}) but the store expects vector({dimensions})"),
            ));
        }

        if self.indexed() {
            let ops = operator_class(self.metric);
            let index_sql = format!(
                "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} USING hnsw (embedding {ops})"
            );
            sqlx::query(&index_sql).execute(&self.pool).await.map_err(Self::map_err)?;
        } else {
            warn!(
                table = %table,
                dimensions,
                max = HNSW_MAX_DIMENSIONS,
                "too many dimensions for an HNSW index; searches scan the whole table"
            );
        }

        let tag_index_sql =
            format!("CREATE INDEX IF NOT EXISTS {table}_source_tag_idx ON {table} (source_tag)");
        sqlx::query(&tag_index_sql).execute(&self.pool).await.map_err(Self::map_err)?;

        debug!(table = %table, dimensions, "pgvector schema ensured");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// The sanitised table name in use.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn indexed(&self) -> bool {
        self.dimensions <= HNSW_MAX_DIMENSIONS
    }

    fn map_err(e: sqlx::Error) -> RagError {
        RagError::storage(BACKEND, e.to_string())
    }

    fn row_to_scored(row: &PgRow) -> Result<ScoredDocument> {
        let id: Uuid = row.try_get("id").map_err(Self::map_err)?;
        let content: String = row.try_get("content").map_err(Self::map_err)?;
        let embedding: String = row.try_get("embedding").map_err(Self::map_err)?;
        let source_tag: String = row.try_get("source_tag").map_err(Self::map_err)?;
        let score: f64 = row.try_get("score").map_err(Self::map_err)?;

        Ok(ScoredDocument {
            document: Document {
                id: DocumentId::from_uuid(id),
                content,
                embedding: parse_vector_literal(&embedding)?,
                source_tag,
            },
            score: score as f32,
        })
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        source_tag: &str,
    ) -> Result<DocumentId> {
        check_dimensions(BACKEND, self.dimensions, embedding.len())?;

        let id = DocumentId::new();
        let insert_sql = format!(
            "INSERT INTO {} (id, content, embedding, source_tag) VALUES ($1, $2, $3::vector, $4)",
            self.table
        );

        sqlx::query(&insert_sql)
            .bind(id.as_uuid())
            .bind(content)
            .bind(vector_literal(embedding))
            .bind(source_tag)
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;

        debug!(backend = BACKEND, %id, source_tag, "inserted document");
        Ok(id)
    }

    async fn search(
        &self,
        embedding: &[f32],
        source_tag: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        check_dimensions(BACKEND, self.dimensions, embedding.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let op = distance_operator(self.metric);
        let score = score_expression(self.metric);
        let search_sql = format!(
            "SELECT id, content, embedding::text AS embedding, source_tag, {score} AS score \
             FROM {table} \
             WHERE ($1::text IS NULL OR source_tag = $1) \
             ORDER BY embedding {op} $2::vector \
             LIMIT $3",
            table = self.table
        );

        let plan = scan_plan(self.indexed(), source_tag.is_some(), k);
        debug!(backend = BACKEND, ?plan, k, "searching");

        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;
        sqlx::query(&plan.setting()).execute(&mut *tx).await.map_err(Self::map_err)?;
        let rows = sqlx::query(&search_sql)
            .bind(source_tag)
            .bind(vector_literal(embedding))
            .bind(k as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        tx.commit().await.map_err(Self::map_err)?;

        rows.iter().map(Self::row_to_scored).collect()
    }

    async fn count(&self) -> Result<usize> {
        let count_sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 =
            sqlx::query_scalar(&count_sql).fetch_one(&self.pool).await.map_err(Self::map_err)?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

/// Sanitize a table name. Only allows ASCII alphanumerics and underscores,
/// and never starts with a digit.
fn sanitize_table_name(name: &str) -> Result<String> {
    let sanitized: String =
        name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect();
    if sanitized.is_empty() {
        return Err(RagError::ConfigError("table name is empty after sanitization".to_string()));
    }
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(format!("t_{sanitized}"));
    }
    Ok(sanitized)
}

/// pgvector expects the vector as a string like `[1,2,3]`.
fn vector_literal(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
}

/// Parse pgvector's text output (`[1,2.5,3]`) back into floats.
fn parse_vector_literal(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| RagError::storage(BACKEND, format!("malformed vector literal '{text}'")))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|e| {
                RagError::storage(BACKEND, format!("malformed vector component '{part}': {e}"))
            })
        })
        .collect()
}

fn distance_operator(metric: SimilarityMetric) -> &'static str {
    match metric {
        SimilarityMetric::Cosine => "<=>",
        SimilarityMetric::Euclidean => "<->",
        SimilarityMetric::InnerProduct => "<#>",
    }
}

fn operator_class(metric: SimilarityMetric) -> &'static str {
    match metric {
        SimilarityMetric::Cosine => "vector_cosine_ops",
        SimilarityMetric::Euclidean => "vector_l2_ops",
        SimilarityMetric::InnerProduct => "vector_ip_ops",
    }
}

/// SQL producing the same score [`SimilarityMetric::score`] computes in memory.
fn score_expression(metric: SimilarityMetric) -> &'static str {
    match metric {
        // <=> is cosine distance, 0 = identical
        SimilarityMetric::Cosine => "(1 - (embedding <=> $2::vector))::float8",
        SimilarityMetric::Euclidean => "(1 / (1 + (embedding <-> $2::vector)))::float8",
        // <#> is the negated inner product
        SimilarityMetric::InnerProduct => "(-(embedding <#> $2::vector))::float8",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_sanitized() {
        assert_eq!(sanitize_table_name("documents").unwrap(), "documents");
        assert_eq!(sanitize_table_name("my-docs; DROP").unwrap(), "my_docs__DROP");
        assert_eq!(sanitize_table_name("2024docs").unwrap(), "t_2024docs");
        assert!(sanitize_table_name("").is_err());
    }

    #[test]
    fn vector_literal_round_trips_through_parser() {
        let v = vec![1.0, -0.25, 3.5e-3];
        assert_eq!(vector_literal(&v), "[1,-0.25,0.0035]");
        assert_eq!(parse_vector_literal(&vector_literal(&v)).unwrap(), v);
    }

    #[test]
    fn malformed_vector_literal_is_a_storage_error() {
        assert!(matches!(parse_vector_literal("1,2"), Err(RagError::StorageError { .. })));
        assert!(matches!(parse_vector_literal("[1,x]"), Err(RagError::StorageError { .. })));
        assert_eq!(parse_vector_literal("[]").unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn tag_filtered_searches_scan_exactly() {
        assert_eq!(scan_plan(true, true, 3), ScanPlan::Exact);
        assert_eq!(scan_plan(true, true, 500), ScanPlan::Exact);
    }

    #[test]
    fn untagged_searches_widen_the_candidate_list_to_k() {
        assert_eq!(scan_plan(true, false, 3), ScanPlan::Approximate { ef_search: 40 });
        assert_eq!(scan_plan(true, false, 250), ScanPlan::Approximate { ef_search: 250 });
        assert_eq!(scan_plan(true, false, 1000), ScanPlan::Approximate { ef_search: 1000 });
        assert_eq!(scan_plan(true, false, 1001), ScanPlan::Exact);
    }

    #[test]
    fn unindexed_tables_always_scan_exactly() {
        assert_eq!(scan_plan(false, false, 3), ScanPlan::Exact);
        assert_eq!(ScanPlan::Exact.setting(), "SET LOCAL enable_indexscan = off");
        assert_eq!(
            ScanPlan::Approximate { ef_search: 64 }.setting(),
            "SET LOCAL hnsw.ef_search = 64"
        );
    }

    #[test]
    fn every_metric_has_matching_sql() {
        for metric in
            [SimilarityMetric::Cosine, SimilarityMetric::Euclidean, SimilarityMetric::InnerProduct]
        {
            assert!(score_expression(metric).contains(distance_operator(metric)));
            assert!(operator_class(metric).starts_with("vector_"));
        }
    }
}
