//! Paste operations: create (with identifier allocation), fetch, list,
//! delete. Composes the validator, id generator, and store; expiry is
//! enforced lazily on the read path.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PasteConfig;
use crate::error::{ApiError, ApiResult};
use crate::id::{IdGenerator, MAX_ID_ATTEMPTS};
use crate::models::{CreatePasteRequest, CreatePasteResponse, PasteDocument, PasteSummary};
use crate::store::{PasteStore, StoreError};
use crate::validation::PasteValidator;

pub struct PasteService {
    store: Arc<dyn PasteStore>,
    validator: PasteValidator,
    ids: IdGenerator,
    id_pattern: regex::Regex,
    clock: Arc<dyn Clock>,
    anonymous_delete: bool,
}

impl PasteService {
    pub fn new(store: Arc<dyn PasteStore>, config: PasteConfig, clock: Arc<dyn Clock>) -> Self {
        let ids = IdGenerator::new(&config.id_alphabet, config.id_length);
        let id_pattern = ids.id_pattern();
        let anonymous_delete = config.anonymous_delete;
        Self {
            store,
            validator: PasteValidator::new(config),
            ids,
            id_pattern,
            clock,
            anonymous_delete,
        }
    }

    /// Create a paste under a freshly allocated identifier.
    ///
    /// The store's duplicate rejection is the uniqueness arbiter; on
    /// conflict a new candidate is generated, up to `MAX_ID_ATTEMPTS`
    /// times. Either a previously-unseen id is committed together with
    /// its document, or the call fails with nothing visible.
    pub async fn create(&self, request: CreatePasteRequest) -> ApiResult<CreatePasteResponse> {
        self.validator.validate_files(&request.files)?;
        let ttl = self.validator.resolve_ttl(request.ttl_secs)?;

        let now = self.clock.now_unix_secs();
        let expires_at = ttl.map(|ttl| now + ttl.as_secs());

        let issued_token = match (&request.owner_token, request.claim) {
            (None, true) => Some(uuid::Uuid::new_v4().to_string()),
            _ => None,
        };
        let owner_token = request.owner_token.clone().or_else(|| issued_token.clone());
        let size_bytes = PasteValidator::total_size(&request.files);

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.ids.generate();
            let doc = PasteDocument {
                id: id.clone(),
                files: request.files.clone(),
                created_at: now,
                expires_at,
                owner_token: owner_token.clone(),
                views: 0,
                size_bytes,
            };

            match self.store.insert(doc, now).await {
                Ok(()) => {
                    tracing::debug!(id = %id, size_bytes, "paste created");
                    return Ok(CreatePasteResponse {
                        id,
                        created_at: now,
                        expires_at,
                        owner_token: issued_token,
                    });
                }
                Err(StoreError::DuplicateId) => {
                    tracing::warn!(attempt, "paste identifier collision, regenerating");
                }
                Err(err @ StoreError::Unavailable(_)) => return Err(err.into()),
            }
        }

        Err(ApiError::AllocationExhausted)
    }

    /// Fetch a paste. Unknown, expired, and tombstoned ids are all
    /// `NotFound`; a read of an expired record also triggers a physical
    /// sweep in the background.
    pub async fn get(&self, id: &str) -> ApiResult<PasteDocument> {
        if !self.id_pattern.is_match(id) {
            return Err(ApiError::NotFound);
        }

        let Some(mut doc) = self.store.get(id).await? else {
            return Err(ApiError::NotFound);
        };

        let now = self.clock.now_unix_secs();
        if doc.expired(now) {
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                if let Err(err) = store.purge_expired(now).await {
                    tracing::warn!(error = %err, "expiry sweep failed");
                }
            });
            return Err(ApiError::NotFound);
        }

        self.store.record_view(id).await?;
        doc.views += 1;
        Ok(doc)
    }

    /// Non-expired pastes owned by `owner_token`, newest first.
    pub async fn list(&self, owner_token: &str) -> ApiResult<Vec<PasteSummary>> {
        let now = self.clock.now_unix_secs();
        let mut docs = self.store.list_by_owner(owner_token).await?;
        docs.retain(|doc| !doc.expired(now));
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(docs.iter().map(PasteDocument::summary).collect())
    }

    /// Delete a paste. Owned pastes require the matching token; ownerless
    /// ones follow the configured anonymous-delete policy.
    pub async fn delete(&self, id: &str, requester_token: Option<&str>) -> ApiResult<()> {
        if !self.id_pattern.is_match(id) {
            return Err(ApiError::NotFound);
        }

        let Some(doc) = self.store.get(id).await? else {
            return Err(ApiError::NotFound);
        };

        let now = self.clock.now_unix_secs();
        if doc.expired(now) {
            // Tombstoned: indistinguishable from never-existed, and the
            // record stays put so the id remains reserved.
            return Err(ApiError::NotFound);
        }

        match &doc.owner_token {
            Some(owner) => {
                if requester_token != Some(owner.as_str()) {
                    return Err(ApiError::Forbidden);
                }
            }
            None => {
                if !self.anonymous_delete {
                    return Err(ApiError::Forbidden);
                }
            }
        }

        if !self.store.delete(id).await? {
            // Lost a race with another delete.
            return Err(ApiError::NotFound);
        }
        tracing::debug!(id = %id, "paste deleted");
        Ok(())
    }

    /// Drop tombstones whose retention has elapsed, releasing their ids.
    pub async fn sweep(&self) -> ApiResult<usize> {
        let now = self.clock.now_unix_secs();
        Ok(self.store.purge_expired(now).await?)
    }
}
