//! Payload serialization for stored values

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Turns values into the text persisted in a store's `payload` column and back
pub trait PayloadCodec<V>: Send + Sync {
    fn encode(&self, value: &V) -> Result<String>;
    fn decode(&self, payload: &str) -> Result<V>;
}

/// Default codec: one JSON document per row
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<V> PayloadCodec<V> for JsonCodec
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, payload: &str) -> Result<V> {
        Ok(serde_json::from_str(payload)?)
    }
}
