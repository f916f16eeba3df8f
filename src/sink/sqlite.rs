//! SQLite destination

use super::{ConflictPolicy, Relation, RowBatch, Sink, SinkError};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

/// Writes rows into a freshly created SQLite database.
///
/// Rows accumulate in one open transaction that is committed every
/// `commit_every` rows and on [`Sink::finish`]. Each insert still executes
/// immediately, so conflicts surface on the call that caused them.
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    commit_every: usize,
    uncommitted: usize,
}

impl SqliteSink {
    /// Create the destination database. Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>, commit_every: usize) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(SinkError::AlreadyExists(path));
        }

        info!("Creating database at {} (SQLite {})", path.display(), rusqlite::version());
        let conn = Connection::open(&path)?;
        Self::setup(conn, Some(path), commit_every)
    }

    /// In-memory database (useful for testing)
    pub fn open_in_memory(commit_every: usize) -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()?;
        Self::setup(conn, None, commit_every)
    }

    fn setup(conn: Connection, path: Option<PathBuf>, commit_every: usize) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("BEGIN")?;
        debug!("Database schema created");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            commit_every: commit_every.max(1),
            uncommitted: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Count rows in a relation (committed or not)
    pub fn count(&self, relation: Relation) -> Result<u64, SinkError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT COUNT(*) FROM {}", relation.name());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Run a closure against the underlying connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, SinkError> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, SinkError>
    where
        F: FnOnce(&Connection) -> Result<T, SinkError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| SinkError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn insert(&mut self, batch: RowBatch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let rows = batch.len();
        let commit = self.uncommitted + rows >= self.commit_every;
        self.blocking(move |conn| {
            write_batch(conn, &batch)?;
            if commit {
                conn.execute_batch("COMMIT; BEGIN")?;
            }
            Ok(())
        })
        .await?;

        self.uncommitted = if commit { 0 } else { self.uncommitted + rows };
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.blocking(|conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        })
        .await?;
        self.uncommitted = 0;
        debug!("Database writes committed");
        Ok(())
    }
}

fn insert_sql(relation: Relation) -> &'static str {
    match relation {
        Relation::Countries => "INSERT INTO countries (id, iso) VALUES (?1, ?2)",
        Relation::TerritorialEntities => "INSERT INTO territorial_entities (id) VALUES (?1)",
        Relation::TerritorialEntitiesParents => {
            "INSERT INTO territorial_entities_parents (id, parent) VALUES (?1, ?2)"
        }
        Relation::ObjectLanguages => {
            "INSERT INTO object_languages (id, lang_id) VALUES (?1, ?2) ON CONFLICT (id, lang_id) DO NOTHING"
        }
        Relation::Languages => "INSERT INTO languages (id, code) VALUES (?1, ?2)",
        Relation::Cities => {
            "INSERT INTO cities (id, country, population, lat, lon) VALUES (?1, ?2, ?3, ?4, ?5)"
        }
        Relation::CitiesLabels => {
            "INSERT INTO cities_labels (id, lang, native_order, label) VALUES (?1, ?2, ?3, ?4)"
        }
    }
}

fn write_batch(conn: &Connection, batch: &RowBatch) -> Result<(), SinkError> {
    let relation = batch.relation();
    let mut stmt = conn.prepare_cached(insert_sql(relation))?;

    let on_error = |e: rusqlite::Error, id: &str| -> SinkError {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation
                    && relation.conflict_policy() == ConflictPolicy::Fail =>
            {
                SinkError::Conflict {
                    relation,
                    id: id.to_string(),
                }
            }
            _ => SinkError::Sqlite(e),
        }
    };

    match batch {
        RowBatch::Countries(rows) => {
            for row in rows {
                stmt.execute(params![row.id, row.iso_code])
                    .map_err(|e| on_error(e, &row.id))?;
            }
        }
        RowBatch::TerritorialEntities(rows) => {
            for row in rows {
                stmt.execute(params![row.id]).map_err(|e| on_error(e, &row.id))?;
            }
        }
        RowBatch::Parents(rows) => {
            for row in rows {
                stmt.execute(params![row.child_id, row.parent_id])
                    .map_err(|e| on_error(e, &row.child_id))?;
            }
        }
        RowBatch::ObjectLanguages(rows) => {
            for row in rows {
                stmt.execute(params![row.entity_id, row.language_id])
                    .map_err(|e| on_error(e, &row.entity_id))?;
            }
        }
        RowBatch::Languages(rows) => {
            for row in rows {
                stmt.execute(params![row.id, row.code])
                    .map_err(|e| on_error(e, &row.id))?;
            }
        }
        RowBatch::Cities(rows) => {
            for row in rows {
                let population = row.population.and_then(|p| i64::try_from(p).ok());
                stmt.execute(params![row.id, row.country_id, population, row.lat, row.lon])
                    .map_err(|e| on_error(e, &row.id))?;
            }
        }
        RowBatch::Labels(rows) => {
            for row in rows {
                stmt.execute(params![row.id, row.lang, None::<i64>, row.text])
                    .map_err(|e| on_error(e, &row.id))?;
            }
        }
        RowBatch::NativeLabels(rows) => {
            for row in rows {
                stmt.execute(params![row.id, row.lang, row.order, row.text])
                    .map_err(|e| on_error(e, &row.id))?;
            }
        }
    }
    Ok(())
}
