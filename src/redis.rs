//! Redis-backed paste store.
//!
//! Documents are stored as JSON blobs under `pastebox:paste:{id}` written
//! with `SET NX`, so Redis itself arbitrates identifier conflicts. View
//! counts live in a separate `INCR`ed key to stay atomic, and owner
//! membership in a per-token set. Tombstone retention rides on key TTLs:
//! a paste with an expiry gets `EXPIREAT expires_at + retention`, keeping
//! the id reserved until retention elapses.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;

use crate::models::PasteDocument;
use crate::store::{PasteStore, StoreError};

pub struct RedisStore {
    client: Client,
    retention_secs: u64,
}

impl RedisStore {
    pub fn new(redis_url: &str, retention_secs: u64) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            retention_secs,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn paste_key(id: &str) -> String {
        format!("pastebox:paste:{id}")
    }

    fn views_key(id: &str) -> String {
        format!("pastebox:views:{id}")
    }

    fn owner_key(token: &str) -> String {
        format!("pastebox:owner:{token}")
    }
}

#[async_trait]
impl PasteStore for RedisStore {
    async fn insert(&self, doc: PasteDocument, _now_secs: u64) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&doc)
            .map_err(|e| StoreError::Unavailable(format!("serialize paste: {e}")))?;
        let mut conn = self.connection().await?;

        let stored: bool = redis::cmd("SET")
            .arg(Self::paste_key(&doc.id))
            .arg(&payload)
            .arg("NX")
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .is_some();
        if !stored {
            return Err(StoreError::DuplicateId);
        }

        if let Some(expires_at) = doc.expires_at {
            let reserved_until = expires_at.saturating_add(self.retention_secs);
            redis::cmd("EXPIREAT")
                .arg(Self::paste_key(&doc.id))
                .arg(reserved_until)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            // Pre-create the view counter with the same lifetime; INCR
            // preserves the TTL, so the counter can never outlive the
            // record it belongs to.
            redis::cmd("SET")
                .arg(Self::views_key(&doc.id))
                .arg(0)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            redis::cmd("EXPIREAT")
                .arg(Self::views_key(&doc.id))
                .arg(reserved_until)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        if let Some(token) = &doc.owner_token {
            redis::cmd("SADD")
                .arg(Self::owner_key(token))
                .arg(&doc.id)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PasteDocument>, StoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = redis::cmd("GET")
            .arg(Self::paste_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let mut doc: PasteDocument = serde_json::from_str(&payload)
            .map_err(|e| StoreError::Unavailable(format!("corrupt paste record: {e}")))?;

        let views: Option<u64> = redis::cmd("GET")
            .arg(Self::views_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        doc.views = views.unwrap_or(0);

        Ok(Some(doc))
    }

    async fn record_view(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("INCR")
            .arg(Self::views_key(id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_token: &str) -> Result<Vec<PasteDocument>, StoreError> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(Self::owner_key(owner_token))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await? {
                Some(doc) => docs.push(doc),
                // The record's TTL has released the id; drop the stale
                // index entry in passing.
                None => {
                    redis::cmd("SREM")
                        .arg(Self::owner_key(owner_token))
                        .arg(&id)
                        .query_async::<_, ()>(&mut conn)
                        .await
                        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                }
            }
        }
        Ok(docs)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let owner_token = self.get(id).await?.and_then(|doc| doc.owner_token);

        let mut conn = self.connection().await?;
        let removed: u64 = redis::cmd("DEL")
            .arg(Self::paste_key(id))
            .arg(Self::views_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Some(token) = owner_token {
            redis::cmd("SREM")
                .arg(Self::owner_key(&token))
                .arg(id)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        Ok(removed > 0)
    }

    async fn purge_expired(&self, _now_secs: u64) -> Result<usize, StoreError> {
        // Key TTLs already evict past-retention records.
        Ok(0)
    }
}
