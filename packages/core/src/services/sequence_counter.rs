//! Sequence Counter
//!
//! Hands out issue numbers per project. Every number comes from one atomic
//! increment on the project's `sequence` field, so uniqueness under any
//! number of concurrent callers rests on the store, not on this process.
//!
//! # Self-healing
//!
//! Before incrementing, the counter makes sure the stored value is not below
//! the highest `number` already used by the project's issues (a counter field
//! that was never written, or was reset, would otherwise hand out duplicates).
//! The correction goes through `DocumentStore::set_if_greater`, so redundant
//! healing by concurrent callers can only raise the value, never lower it.
//!
//! Narrow race: a caller that read a stale maximum may raise the counter to
//! a value another caller has already incremented past. `set_if_greater`
//! makes that raise a no-op, so the race costs nothing with stores that
//! provide the conditional write. Stores that can only overwrite must run
//! healing before any increments begin.
//!
//! # Cache
//!
//! A short-lived per-project entry records that the healing check passed.
//! It is only used to skip that check; the increment itself always hits the
//! store. Increments keep the entry and only raise its value, since an
//! increment can never put the counter below an issue number. Writes that
//! could (project deletion, a vanished project, explicit `invalidate`) drop
//! it. Expired entries are pruned whenever a new entry is written.

use crate::db::{from_document, Collection, DocumentStore, Filter, FindOptions};
use crate::models::{Issue, Project, ValidationError};
use crate::services::error::ServiceError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Document field holding the counter on project documents
pub const SEQUENCE_FIELD: &str = "sequence";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
struct CachedSequence {
    /// Last counter value this process saw for the project
    value: i64,
    expires_at: Instant,
}

/// Per-project atomic integer generator
pub struct SequenceCounter {
    store: Arc<dyn DocumentStore>,

    /// Map: project_id → last verified counter value
    cache: RwLock<HashMap<String, CachedSequence>>,

    /// Zero disables caching
    cache_ttl: Duration,
}

impl SequenceCounter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    /// Create a counter with a custom cache TTL (primarily for testing)
    pub fn with_ttl(store: Arc<dyn DocumentStore>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        }
    }

    /// Next number for a project
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist
    /// - `Sequence` if the store's increment returns no usable integer
    pub async fn next(&self, project_id: &str) -> Result<i64, ServiceError> {
        self.ensure_initialized(project_id).await?;
        self.increment(project_id, 1).await
    }

    /// Reserve `count` contiguous numbers in one round trip
    ///
    /// Performs a single add-by-`count` and derives the range
    /// `[new - count + 1, new]`, returned in ascending order.
    pub async fn reserve_batch(
        &self,
        project_id: &str,
        count: usize,
    ) -> Result<Vec<i64>, ServiceError> {
        let delta = i64::try_from(count)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ValidationError::invalid_field_value(
                    "count",
                    format!("must be between 1 and {}", i64::MAX),
                )
            })?;

        self.ensure_initialized(project_id).await?;
        let last = self.increment(project_id, delta).await?;
        let first = last - delta + 1;
        if first < 1 {
            return Err(ServiceError::sequence(
                project_id,
                format!("counter returned {} after adding {}", last, delta),
            ));
        }

        tracing::debug!(project_id, first, last, "Reserved sequence range");
        Ok((first..=last).collect())
    }

    /// Drop the cached verification for a project
    pub async fn invalidate(&self, project_id: &str) {
        self.cache.write().await.remove(project_id);
    }

    /// Last counter value seen for a project, if the entry is still fresh
    pub async fn cached_value(&self, project_id: &str) -> Option<i64> {
        let cache = self.cache.read().await;
        cache
            .get(project_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value)
    }

    /// Number of entries currently held, fresh or not
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn increment(&self, project_id: &str, delta: i64) -> Result<i64, ServiceError> {
        let raw = self
            .store
            .atomic_increment(Collection::Projects, project_id, SEQUENCE_FIELD, delta)
            .await
            .map_err(|e| ServiceError::store("sequence increment", e))?;

        let value = match raw {
            None => {
                // Project vanished between the healing check and the increment
                self.invalidate(project_id).await;
                return Err(ServiceError::not_found("Project", project_id));
            }
            Some(Value::Number(n)) => n.as_i64(),
            Some(_) => None,
        };

        let value = value.ok_or_else(|| {
            ServiceError::sequence(project_id, "atomic increment returned no integer value")
        })?;

        let mut cache = self.cache.write().await;
        if let Some(entry) = cache.get_mut(project_id) {
            entry.value = entry.value.max(value);
        }

        Ok(value)
    }

    async fn ensure_initialized(&self, project_id: &str) -> Result<(), ServiceError> {
        if self.cached_value(project_id).await.is_some() {
            return Ok(());
        }

        let project: Project = self
            .store
            .find_one(Collection::Projects, &Filter::by_id(project_id))
            .await
            .map_err(|e| ServiceError::store("project lookup", e))?
            .map(from_document)
            .transpose()
            .map_err(|e| ServiceError::store("project decode", e))?
            .ok_or_else(|| ServiceError::not_found("Project", project_id))?;

        let highest = self.highest_issue_number(project_id).await?;

        let verified = match project.sequence {
            Some(stored) if stored >= highest => stored,
            stored => {
                tracing::warn!(
                    project_id,
                    stored = ?stored,
                    highest,
                    "Sequence counter behind existing issues, healing"
                );
                let raised = self
                    .store
                    .set_if_greater(Collection::Projects, project_id, SEQUENCE_FIELD, highest)
                    .await
                    .map_err(|e| ServiceError::store("sequence heal", e))?;
                if !raised {
                    tracing::debug!(project_id, "Sequence already healed by another writer");
                }
                highest
            }
        };

        if !self.cache_ttl.is_zero() {
            let now = Instant::now();
            let mut cache = self.cache.write().await;
            cache.retain(|_, entry| entry.expires_at > now);
            cache.insert(
                project_id.to_string(),
                CachedSequence {
                    value: verified,
                    expires_at: now + self.cache_ttl,
                },
            );
        }

        Ok(())
    }

    async fn highest_issue_number(&self, project_id: &str) -> Result<i64, ServiceError> {
        let docs = self
            .store
            .find_all(
                Collection::Issues,
                &Filter::new().eq("projectId", project_id),
                &FindOptions::new().sort_desc("number").limit(1),
            )
            .await
            .map_err(|e| ServiceError::store("highest issue number", e))?;

        match docs.into_iter().next() {
            Some(doc) => {
                let issue: Issue =
                    from_document(doc).map_err(|e| ServiceError::store("issue decode", e))?;
                Ok(issue.number.max(0))
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
#[path = "sequence_counter_test.rs"]
mod sequence_counter_test;
