//! One store per table name

use crate::error::{Error, Result};
use crate::storage::codec::{JsonCodec, PayloadCodec};
use crate::storage::db::Database;
use crate::storage::store::{Store, StoreKey, UniqueIndex};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use std::any::Any;
use std::sync::Arc;
use tracing::info;

/// Creates stores and remembers every name handed out.
///
/// Registering the same name twice is an error, so two stores can never share
/// (and fight over) one table inside a process.
pub struct StoreRegistry {
    pool: SqlitePool,
    stores: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl StoreRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            stores: DashMap::new(),
        }
    }

    /// Register a JSON-backed store for `name`
    pub fn create_store<K, V>(&self, name: &str, index: Option<UniqueIndex<V>>) -> Result<Arc<Store<K, V>>>
    where
        K: StoreKey,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.create_store_with_codec(name, index, Arc::new(JsonCodec))
    }

    pub fn create_store_with_codec<K, V>(
        &self,
        name: &str,
        index: Option<UniqueIndex<V>>,
        codec: Arc<dyn PayloadCodec<V>>,
    ) -> Result<Arc<Store<K, V>>>
    where
        K: StoreKey,
        V: Send + Sync + 'static,
    {
        match self.stores.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::StoreAlreadyExists(name.to_string())),
            Entry::Vacant(slot) => {
                let store = Arc::new(Store::new(self.pool.clone(), name, codec, index)?);
                slot.insert(store.clone());
                info!("Registered store {}", name);
                Ok(store)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Forget every registration. Tables and their rows are left untouched.
    pub fn clear(&self) {
        self.stores.clear();
    }
}
