//! Generic key-value store backed by one SQLite table

use crate::cache::MissHandler;
use crate::error::{Error, Result};
use crate::storage::codec::PayloadCodec;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ID_COLUMN: &str = "id";
const PAYLOAD_COLUMN: &str = "payload";

/// SQL type family of a store's primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Text,
}

impl KeyKind {
    fn sql_type(self) -> &'static str {
        match self {
            KeyKind::Integer => "INTEGER",
            KeyKind::Text => "VARCHAR(100)",
        }
    }
}

/// Types usable as a store primary key
pub trait StoreKey:
    for<'q> sqlx::Encode<'q, Sqlite>
    + sqlx::Type<Sqlite>
    + Clone
    + std::fmt::Debug
    + Send
    + Sync
    + 'static
{
    const KIND: KeyKind;
}

impl StoreKey for i64 {
    const KIND: KeyKind = KeyKind::Integer;
}

impl StoreKey for String {
    const KIND: KeyKind = KeyKind::Text;
}

/// Optional secondary column holding a unique string derived from the payload
pub struct UniqueIndex<V> {
    column: String,
    extractor: Arc<dyn Fn(&V) -> String + Send + Sync>,
}

impl<V> UniqueIndex<V> {
    pub fn new(column: impl Into<String>, extractor: impl Fn(&V) -> String + Send + Sync + 'static) -> Self {
        Self {
            column: column.into(),
            extractor: Arc::new(extractor),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn extract(&self, value: &V) -> String {
        (self.extractor)(value)
    }
}

impl<V> Clone for UniqueIndex<V> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            extractor: self.extractor.clone(),
        }
    }
}

/// SQL text for one table, rendered once at construction
struct Statements {
    create_table: String,
    select_by_id: String,
    select_for_update: String,
    upsert: String,
    delete: String,
    select_page: String,
}

impl Statements {
    fn render(table: &str, key_kind: KeyKind, index: Option<&str>) -> Self {
        let mut create_columns = format!(
            "{ID_COLUMN} {} PRIMARY KEY NOT NULL, {PAYLOAD_COLUMN} TEXT NOT NULL",
            key_kind.sql_type()
        );
        let mut select_filter = format!("{ID_COLUMN} = ?1");
        let mut insert_columns = format!("{ID_COLUMN}, {PAYLOAD_COLUMN}");
        let mut insert_values = "?1, ?2".to_string();
        let mut on_conflict = format!("{PAYLOAD_COLUMN} = excluded.{PAYLOAD_COLUMN}");

        if let Some(column) = index {
            create_columns.push_str(&format!(
                ", {column} {}, CONSTRAINT unique_{column} UNIQUE ({column})",
                KeyKind::Text.sql_type()
            ));
            select_filter.push_str(&format!(" OR {column} = ?2"));
            insert_columns.push_str(&format!(", {column}"));
            insert_values.push_str(", ?3");
            on_conflict.push_str(&format!(", {column} = excluded.{column}"));
        }

        Self {
            create_table: format!("CREATE TABLE IF NOT EXISTS {table} ({create_columns})"),
            select_by_id: format!("SELECT {PAYLOAD_COLUMN} FROM {table} WHERE {ID_COLUMN} = ?1"),
            // The primary-key row wins when the index hint matches a different row too
            select_for_update: format!(
                "SELECT {PAYLOAD_COLUMN} FROM {table} WHERE {select_filter} \
                 ORDER BY CASE WHEN {ID_COLUMN} = ?1 THEN 0 ELSE 1 END LIMIT 1"
            ),
            upsert: format!(
                "INSERT INTO {table} ({insert_columns}) VALUES ({insert_values}) \
                 ON CONFLICT({ID_COLUMN}) DO UPDATE SET {on_conflict}"
            ),
            delete: format!("DELETE FROM {table} WHERE {ID_COLUMN} = ?1"),
            select_page: format!(
                "SELECT {PAYLOAD_COLUMN} FROM {table} ORDER BY {ID_COLUMN} LIMIT ?1 OFFSET ?2"
            ),
        }
    }
}

/// Durable `key -> payload` map living in a single table.
///
/// Values are serialized by a [`PayloadCodec`]. The table is created the first time
/// an operation finds it missing. [`Store::update`] is the only write path and runs
/// as a locked read-modify-write transaction.
pub struct Store<K, V> {
    pool: SqlitePool,
    table: String,
    codec: Arc<dyn PayloadCodec<V>>,
    index: Option<UniqueIndex<V>>,
    sql: Statements,
    _key: PhantomData<fn() -> K>,
}

impl<K, V> Store<K, V>
where
    K: StoreKey,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        pool: SqlitePool,
        table: &str,
        codec: Arc<dyn PayloadCodec<V>>,
        index: Option<UniqueIndex<V>>,
    ) -> Result<Self> {
        validate_identifier("Store", table)?;
        if let Some(index) = &index {
            validate_identifier("Index column", index.column())?;
            if index.column() == ID_COLUMN || index.column() == PAYLOAD_COLUMN {
                return Err(Error::InvalidParameter(format!(
                    "Index column can't be named {:?}",
                    index.column()
                )));
            }
        }

        let sql = Statements::render(table, K::KIND, index.as_ref().map(|i| i.column()));
        Ok(Self {
            pool,
            table: table.to_string(),
            codec,
            index,
            sql,
            _key: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    /// Fetch and decode the payload stored under `key`
    pub async fn get_by_id(&self, key: &K) -> Result<Option<V>> {
        match self.fetch_by_id(key).await {
            Err(e) if is_missing_table(&e) => {
                self.create_table().await?;
                self.fetch_by_id(key).await
            }
            other => other,
        }
    }

    /// Read-modify-write of the row under `key`.
    ///
    /// `f` receives the current value (if any) and returns the new one; `None` deletes
    /// the row. The database write lock is held while `f` runs, so it must be quick
    /// and must not do I/O. An error from `f` rolls the transaction back and is
    /// returned as is.
    pub async fn update<F>(&self, key: &K, f: F) -> Result<Option<V>>
    where
        F: FnMut(Option<V>) -> Result<Option<V>> + Send,
    {
        self.update_with_index(key, None, f).await
    }

    /// Like [`Store::update`], but also selects the row whose unique index column
    /// equals `index_hint`, so `f` can detect a conflicting entry before writing.
    pub async fn update_with_index<F>(
        &self,
        key: &K,
        index_hint: Option<&str>,
        mut f: F,
    ) -> Result<Option<V>>
    where
        F: FnMut(Option<V>) -> Result<Option<V>> + Send,
    {
        match self.try_update(key, index_hint, &mut f).await {
            Err(e) if is_missing_table(&e) => {
                self.create_table().await?;
                self.try_update(key, index_hint, &mut f).await
            }
            other => other,
        }
    }

    /// Rows ordered by key, skipping `offset` and returning at most `limit`.
    ///
    /// Rows that can't be decoded are skipped instead of failing the whole page.
    pub async fn get_all(&self, offset: i64, limit: i64) -> Result<Vec<V>> {
        let payloads = match self.fetch_page(offset, limit).await {
            Err(e) if is_missing_table(&e) => {
                self.create_table().await?;
                self.fetch_page(offset, limit).await?
            }
            other => other?,
        };

        Ok(payloads
            .into_iter()
            .filter_map(|payload| match self.codec.decode(&payload) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Skipping undecodable row in {}: {}", self.table, e);
                    None
                }
            })
            .collect())
    }

    async fn fetch_by_id(&self, key: &K) -> Result<Option<V>> {
        let payload: Option<String> = sqlx::query_scalar(&self.sql.select_by_id)
            .bind(key.clone())
            .fetch_optional(&self.pool)
            .await?;

        payload.map(|p| self.codec.decode(&p)).transpose()
    }

    async fn fetch_page(&self, offset: i64, limit: i64) -> Result<Vec<String>> {
        let payloads: Vec<String> = sqlx::query_scalar(&self.sql.select_page)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(payloads)
    }

    async fn try_update<F>(&self, key: &K, index_hint: Option<&str>, f: &mut F) -> Result<Option<V>>
    where
        F: FnMut(Option<V>) -> Result<Option<V>> + Send,
    {
        let mut txn = WriteTxn::begin(&self.pool).await?;

        let outcome = self.update_locked(txn.conn()?, key, index_hint, f).await;
        match outcome {
            Ok(result) => {
                txn.commit().await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!("Rollback failed on {}: {}", self.table, rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn update_locked<F>(
        &self,
        conn: &mut SqliteConnection,
        key: &K,
        index_hint: Option<&str>,
        f: &mut F,
    ) -> Result<Option<V>>
    where
        F: FnMut(Option<V>) -> Result<Option<V>> + Send,
    {
        let mut select = sqlx::query_scalar::<_, String>(&self.sql.select_for_update).bind(key.clone());
        if self.index.is_some() {
            select = select.bind(index_hint.map(str::to_owned));
        }
        let payload = select.fetch_optional(&mut *conn).await?;

        let current = payload.map(|p| self.codec.decode(&p)).transpose()?;
        let existed = current.is_some();

        let result = f(current)?;

        match &result {
            None if existed => {
                sqlx::query(&self.sql.delete)
                    .bind(key.clone())
                    .execute(&mut *conn)
                    .await?;
            }
            None => {}
            Some(value) => {
                let mut upsert = sqlx::query(&self.sql.upsert)
                    .bind(key.clone())
                    .bind(self.codec.encode(value)?);
                if let Some(index) = &self.index {
                    upsert = upsert.bind(index.extract(value));
                }
                upsert
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| self.classify_write_error(e))?;
            }
        }

        Ok(result)
    }

    async fn create_table(&self) -> Result<()> {
        info!("Creating missing table {}", self.table);
        sqlx::query(&self.sql.create_table).execute(&self.pool).await?;
        Ok(())
    }

    fn classify_write_error(&self, err: sqlx::Error) -> Error {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed") {
                debug!("Unique constraint violated in {}: {}", self.table, db_err.message());
                return Error::EntityAlreadyExists(format!("Entry in {}", self.table));
            }
        }
        Error::Database(err)
    }
}

/// Pooled connection holding an open `BEGIN IMMEDIATE` transaction.
///
/// Unless the transaction ended cleanly, the connection is closed on drop instead of
/// going back to the pool, which releases the database write lock. This covers a
/// failed COMMIT or ROLLBACK and an update future dropped halfway.
struct WriteTxn {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTxn {
    async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut txn = Self {
            conn: Some(pool.acquire().await?),
        };
        // IMMEDIATE takes the write lock up front, before the read
        sqlx::query("BEGIN IMMEDIATE").execute(txn.conn()?).await?;
        Ok(txn)
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or(Error::Database(sqlx::Error::PoolClosed))
    }

    async fn commit(mut self) -> Result<()> {
        sqlx::query("COMMIT").execute(self.conn()?).await?;
        self.conn.take();
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        sqlx::query("ROLLBACK").execute(self.conn()?).await?;
        self.conn.take();
        Ok(())
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!("Closing connection left inside a write transaction");
            drop(conn.detach());
        }
    }
}

#[async_trait]
impl<K, V> MissHandler<K, V> for Store<K, V>
where
    K: StoreKey,
    V: Send + Sync + 'static,
{
    async fn fetch(&self, key: &K) -> Result<Option<V>> {
        self.get_by_id(key).await
    }
}

fn is_missing_table(err: &Error) -> bool {
    match err {
        Error::Database(sqlx::Error::Database(db_err)) => {
            db_err.message().starts_with("no such table")
        }
        _ => false,
    }
}

/// Table and column names end up inside SQL text, so only plain identifiers pass
fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{} name must contain only letters, digits and underscores. Got: {:?}",
            kind, name
        )))
    }
}
