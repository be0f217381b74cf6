//! libSQL storage layer for raw and enriched tool records.
//!
//! The [`Storage`] struct wraps a local libSQL database and implements both
//! store seams consumed by the enrichment engine:
//! - [`RecordStore`]: raw records with a mutable processing status
//! - [`ResultStore`]: append-only enriched records
//!
//! Status filtering happens in SQL so that a record's status is observed at
//! read time; there is no client-side locking.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use toolscout_shared::{
    EnrichedRecord, NewEnrichedRecord, ProsCons, RawRecord, RecordStatus, Result, StatusUpdate,
    ToolProfile, ToolscoutError,
};

// ---------------------------------------------------------------------------
// Store seams
// ---------------------------------------------------------------------------

/// Durable collection of raw records with a mutable processing status.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records currently at `status`, in insertion order.
    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<RawRecord>>;

    /// The record with `id`, only if it is currently at `status`.
    async fn find_by_id_and_status(
        &self,
        id: &str,
        status: RecordStatus,
    ) -> Result<Option<RawRecord>>;

    /// Apply a status transition. Errors if no record has `id`.
    async fn update_status(&self, id: &str, update: &StatusUpdate) -> Result<()>;

    /// Number of records at `status`.
    async fn count_by_status(&self, status: RecordStatus) -> Result<u64>;
}

/// Durable, append-only collection of enriched records.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a record and return its store-assigned id.
    async fn insert_enriched(&self, record: &NewEnrichedRecord) -> Result<String>;

    /// One page of records sorted by `processed_at`, newest first.
    async fn list_enriched_page(&self, offset: u64, limit: u64) -> Result<Vec<EnrichedRecord>>;

    /// Total number of enriched records.
    async fn count_enriched(&self) -> Result<u64>;

    /// Whether an enriched record already uses `slug`.
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

const RAW_COLUMNS: &str =
    "id, fields_json, status, error_message, error_at, processed_at, created_at";

const ENRICHED_COLUMNS: &str = "id, original_id, slug, name, website, tagline, \
     short_description, company, description, categories_json, features_json, \
     integrations_json, pros_cons_json, use_cases_json, logo, processed_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ToolscoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ToolscoutError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Raw record operations outside the engine seam
    // -----------------------------------------------------------------------

    /// Insert a new pending raw record. Returns the generated id.
    pub async fn insert_raw_record(
        &self,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let fields_json = to_json(fields)?;
        self.conn
            .execute(
                "INSERT INTO raw_tools (id, fields_json, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.as_str(),
                    fields_json,
                    RecordStatus::Pending.code(),
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Get a raw record by id regardless of status.
    pub async fn get_raw_record(&self, id: &str) -> Result<Option<RawRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RAW_COLUMNS} FROM raw_tools WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_raw_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<RawRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RAW_COLUMNS} FROM raw_tools WHERE status = ?1 ORDER BY rowid"),
                params![status.code()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_raw_record(&row)?);
        }
        Ok(results)
    }

    async fn find_by_id_and_status(
        &self,
        id: &str,
        status: RecordStatus,
    ) -> Result<Option<RawRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RAW_COLUMNS} FROM raw_tools WHERE id = ?1 AND status = ?2"),
                params![id, status.code()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_raw_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn update_status(&self, id: &str, update: &StatusUpdate) -> Result<()> {
        let code = update.status().code();
        let affected = match update {
            StatusUpdate::Processed { at } => {
                self.conn
                    .execute(
                        "UPDATE raw_tools
                         SET status = ?1, processed_at = ?2, error_message = NULL, error_at = NULL
                         WHERE id = ?3",
                        params![code, at.to_rfc3339(), id],
                    )
                    .await
            }
            StatusUpdate::Failed { message, at } => {
                let at = at.to_rfc3339();
                self.conn
                    .execute(
                        "UPDATE raw_tools
                         SET status = ?1, processed_at = ?2, error_message = ?3, error_at = ?4
                         WHERE id = ?5",
                        params![code, at.as_str(), message.as_str(), at.as_str(), id],
                    )
                    .await
            }
            StatusUpdate::Pending => {
                self.conn
                    .execute(
                        "UPDATE raw_tools
                         SET status = ?1, processed_at = NULL, error_message = NULL, error_at = NULL
                         WHERE id = ?2",
                        params![code, id],
                    )
                    .await
            }
        }
        .map_err(storage_err)?;

        if affected == 0 {
            return Err(ToolscoutError::Storage(format!("no raw record with id {id}")));
        }
        Ok(())
    }

    async fn count_by_status(&self, status: RecordStatus) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM raw_tools WHERE status = ?1",
            status.code(),
        )
        .await
    }
}

#[async_trait]
impl ResultStore for Storage {
    async fn insert_enriched(&self, record: &NewEnrichedRecord) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let p = &record.profile;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO enriched_tools ({ENRICHED_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    id.as_str(),
                    record.original_id.as_str(),
                    p.slug.as_str(),
                    p.name.as_str(),
                    p.website.as_str(),
                    p.tagline.as_str(),
                    p.short_description.as_str(),
                    p.company.as_str(),
                    p.description.as_str(),
                    to_json(&p.categories)?,
                    to_json(&p.features)?,
                    to_json(&p.integrations)?,
                    to_json(&p.pros_cons)?,
                    to_json(&p.use_cases)?,
                    record.logo.as_deref(),
                    record.processed_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    async fn list_enriched_page(&self, offset: u64, limit: u64) -> Result<Vec<EnrichedRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ENRICHED_COLUMNS} FROM enriched_tools
                     ORDER BY processed_at DESC, rowid DESC
                     LIMIT ?1 OFFSET ?2"
                ),
                params![
                    i64::try_from(limit).unwrap_or(i64::MAX),
                    i64::try_from(offset).unwrap_or(i64::MAX)
                ],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_enriched_record(&row)?);
        }
        Ok(results)
    }

    async fn count_enriched(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM enriched_tools", params![])
            .await
            .map_err(storage_err)?;
        first_count(&mut rows).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM enriched_tools WHERE slug = ?1 LIMIT 1",
                params![slug],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows.next().await.map_err(storage_err)?.is_some())
    }
}

impl Storage {
    async fn count(&self, sql: &str, code: i64) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![code])
            .await
            .map_err(storage_err)?;
        first_count(&mut rows).await
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn storage_err(e: libsql::Error) -> ToolscoutError {
    ToolscoutError::Storage(e.to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ToolscoutError::Storage(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| ToolscoutError::Storage(format!("invalid JSON in {column}: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ToolscoutError::Storage(format!("invalid date: {e}")))
}

fn optional_timestamp(row: &libsql::Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    row.get::<String>(idx)
        .ok()
        .map(|s| parse_timestamp(&s))
        .transpose()
}

async fn first_count(rows: &mut libsql::Rows) -> Result<u64> {
    match rows.next().await.map_err(storage_err)? {
        Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
        None => Ok(0),
    }
}

/// Convert a `raw_tools` row to a [`RawRecord`].
fn row_to_raw_record(row: &libsql::Row) -> Result<RawRecord> {
    let code: i64 = row.get(2).map_err(storage_err)?;
    let status = RecordStatus::from_code(code)
        .ok_or_else(|| ToolscoutError::Storage(format!("unknown status code {code}")))?;
    let fields_json: String = row.get(1).map_err(storage_err)?;
    let created_at: String = row.get(6).map_err(storage_err)?;

    Ok(RawRecord {
        id: row.get::<String>(0).map_err(storage_err)?,
        fields: from_json("fields_json", &fields_json)?,
        status,
        error_message: row.get::<String>(3).ok(),
        error_at: optional_timestamp(row, 4)?,
        processed_at: optional_timestamp(row, 5)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Convert an `enriched_tools` row to an [`EnrichedRecord`].
fn row_to_enriched_record(row: &libsql::Row) -> Result<EnrichedRecord> {
    let text = |idx: i32| row.get::<String>(idx).map_err(storage_err);

    let pros_cons: ProsCons = from_json("pros_cons_json", &text(12)?)?;
    let profile = ToolProfile {
        slug: text(2)?,
        name: text(3)?,
        website: text(4)?,
        tagline: text(5)?,
        short_description: text(6)?,
        company: text(7)?,
        description: text(8)?,
        categories: from_json("categories_json", &text(9)?)?,
        features: from_json("features_json", &text(10)?)?,
        integrations: from_json("integrations_json", &text(11)?)?,
        pros_cons,
        use_cases: from_json("use_cases_json", &text(13)?)?,
    };

    Ok(EnrichedRecord {
        id: text(0)?,
        record: NewEnrichedRecord {
            original_id: text(1)?,
            profile,
            logo: row.get::<String>(14).ok(),
            processed_at: parse_timestamp(&text(15)?)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use toolscout_shared::Feature;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().expect("object")
    }

    fn enriched(original_id: &str, slug: &str, processed_at: DateTime<Utc>) -> NewEnrichedRecord {
        NewEnrichedRecord {
            original_id: original_id.into(),
            profile: ToolProfile {
                slug: slug.into(),
                name: "Linear".into(),
                website: "https://linear.app".into(),
                description: "Issue tracking".into(),
                categories: vec!["Project Management".into()],
                features: vec![Feature {
                    name: "Cycles".into(),
                    description: "Time-boxed sprints".into(),
                }],
                pros_cons: ProsCons {
                    pros: vec!["Fast".into()],
                    cons: vec![],
                },
                ..Default::default()
            },
            logo: Some("https://linear.app/logo.png".into()),
            processed_at,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ts_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn raw_record_lifecycle() {
        let storage = test_storage().await;
        let id = storage
            .insert_raw_record(&fields(serde_json::json!({"name": "Linear"})))
            .await
            .expect("insert raw");

        let pending = storage
            .list_by_status(RecordStatus::Pending)
            .await
            .expect("list pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].text_field("name"), Some("Linear"));
        assert!(pending[0].processed_at.is_none());

        storage
            .update_status(&id, &StatusUpdate::Processed { at: Utc::now() })
            .await
            .expect("mark processed");

        assert!(
            storage
                .find_by_id_and_status(&id, RecordStatus::Pending)
                .await
                .unwrap()
                .is_none()
        );
        let processed = storage
            .find_by_id_and_status(&id, RecordStatus::Processed)
            .await
            .unwrap()
            .expect("processed record");
        assert!(processed.processed_at.is_some());
        assert!(processed.error_message.is_none());
        assert_eq!(storage.count_by_status(RecordStatus::Processed).await.unwrap(), 1);
        assert_eq!(storage.count_by_status(RecordStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_then_reset() {
        let storage = test_storage().await;
        let id = storage
            .insert_raw_record(&fields(serde_json::json!({"title": "Figma"})))
            .await
            .unwrap();

        storage
            .update_status(
                &id,
                &StatusUpdate::Failed {
                    message: "analysis error: 429".into(),
                    at: Utc::now(),
                },
            )
            .await
            .expect("mark failed");

        let failed = storage.get_raw_record(&id).await.unwrap().unwrap();
        assert_eq!(failed.status, RecordStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("analysis error: 429"));
        assert!(failed.error_at.is_some());

        storage
            .update_status(&id, &StatusUpdate::Pending)
            .await
            .expect("reset");
        let reset = storage.get_raw_record(&id).await.unwrap().unwrap();
        assert_eq!(reset.status, RecordStatus::Pending);
        assert!(reset.error_message.is_none());
        assert!(reset.error_at.is_none());
        assert!(reset.processed_at.is_none());
    }

    #[tokio::test]
    async fn update_status_unknown_id_errors() {
        let storage = test_storage().await;
        let result = storage
            .update_status("missing", &StatusUpdate::Processed { at: Utc::now() })
            .await;
        assert!(result.unwrap_err().to_string().contains("no raw record"));
    }

    #[tokio::test]
    async fn status_code_is_persisted_as_integer() {
        let storage = test_storage().await;
        let id = storage
            .insert_raw_record(&fields(serde_json::json!({"name": "x"})))
            .await
            .unwrap();
        storage
            .update_status(
                &id,
                &StatusUpdate::Failed {
                    message: "boom".into(),
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let mut rows = storage
            .conn
            .query("SELECT status FROM raw_tools WHERE id = ?1", params![id.as_str()])
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), -1);
    }

    #[tokio::test]
    async fn enriched_insert_and_page() {
        let storage = test_storage().await;
        let now = Utc::now();

        let older = storage
            .insert_enriched(&enriched("r1", "linear", now - Duration::hours(1)))
            .await
            .expect("insert older");
        let newer = storage
            .insert_enriched(&enriched("r2", "linear-2", now))
            .await
            .expect("insert newer");

        assert_eq!(storage.count_enriched().await.unwrap(), 2);
        assert!(storage.slug_exists("linear").await.unwrap());
        assert!(!storage.slug_exists("figma").await.unwrap());

        let page = storage.list_enriched_page(0, 10).await.expect("page");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, newer);
        assert_eq!(page[1].id, older);
        assert_eq!(page[0].record.profile.features.len(), 1);
        assert_eq!(page[0].record.profile.pros_cons.pros, vec!["Fast".to_string()]);
        assert_eq!(page[0].record.logo.as_deref(), Some("https://linear.app/logo.png"));

        let second = storage.list_enriched_page(1, 1).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, older);

        let beyond = storage.list_enriched_page(u64::MAX, 10).await.unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let storage = test_storage().await;
        storage
            .insert_enriched(&enriched("r1", "linear", Utc::now()))
            .await
            .unwrap();
        let dup = storage
            .insert_enriched(&enriched("r2", "linear", Utc::now()))
            .await;
        assert!(dup.is_err());
    }
}
