//! Sync cycle orchestration.
//!
//! A cycle runs `Preparing -> Uploading -> Downloading -> RetryingFailed ->
//! Completed`. Per-entity failures are collected into the cycle result and
//! never abort it; `run_cycle` itself cannot fail.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::progress::{SyncProgress, SyncStage};
use super::resolver::{resolve, Winner};
use super::retry::{backoff_delay, RetryQueue, RetryQueueEntry};
use crate::db::SyncStore;
use crate::error::{Error, Result};
use crate::models::{EntityId, JournalEntity, SyncDirection, SyncLogStatus, SyncSettings};
use crate::network::NetworkMonitor;
use crate::remote::{
    LivenessProbe, RemoteError, RemoteRecord, RemoteResult, RemoteStore, UpsertRequest,
};
use crate::util::unix_millis_now;

const PROGRESS_CAPACITY: usize = 64;
const TITLE_PREVIEW_LEN: usize = 60;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEngineConfig {
    /// Upper bound for every upload or download call
    pub request_timeout: Duration,
    /// Inline retries after the initial upload failure
    pub max_retries: u32,
    /// First retry delay; doubles per attempt, zero disables waiting
    pub retry_backoff: Duration,
    pub log_retention_days: u32,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            log_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyRunning,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Timeout, refused connection or server-side failure
    Transient,
    /// Validation or other permanent refusal by the remote
    Rejected,
    /// The remote held a newer revision and the cycle could not settle it
    Conflict,
    /// Credential missing or rejected; halts the cycle's remote work
    Unauthorized,
    /// Local transaction failure
    Storage,
    /// Transient failure that outlived every retry
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct SyncError {
    /// `None` for cycle-level failures
    pub entity_id: Option<EntityId>,
    pub kind: SyncErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl SyncError {
    fn remote(entity_id: Option<EntityId>, error: &RemoteError) -> Self {
        let kind = if error.is_auth() {
            SyncErrorKind::Unauthorized
        } else if error.is_conflict() {
            SyncErrorKind::Conflict
        } else if error.is_retryable() {
            SyncErrorKind::Transient
        } else {
            SyncErrorKind::Rejected
        };
        Self {
            entity_id,
            kind,
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }

    fn storage(entity_id: Option<EntityId>, error: &Error) -> Self {
        Self {
            entity_id,
            kind: SyncErrorKind::Storage,
            message: error.to_string(),
            retryable: false,
        }
    }

    fn exhausted(entry: &RetryQueueEntry) -> Self {
        Self {
            entity_id: Some(entry.entity_id),
            kind: SyncErrorKind::Exhausted,
            message: format!(
                "Gave up on \"{}\" after {} retries: {}",
                entry.title,
                entry.attempt_count,
                entry.last_error.as_deref().unwrap_or("unknown error")
            ),
            retryable: false,
        }
    }
}

/// Aggregate outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSyncResult {
    pub uploaded: usize,
    pub downloaded: usize,
    /// Remote and local revisions that disagreed and were settled
    pub conflicts_resolved: usize,
    /// Dirty entities left once the cycle finished
    pub pending: usize,
    pub errors: Vec<SyncError>,
    /// Set when the cycle did not run at all
    pub skipped: Option<SkipReason>,
    /// Set when connectivity dropped mid-cycle
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl BatchSyncResult {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Number of distinct entities that ended the cycle with an error
    #[must_use]
    pub fn failed(&self) -> usize {
        let mut ids: Vec<EntityId> = self.errors.iter().filter_map(|e| e.entity_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled && self.skipped.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Uploaded,
    AlreadySynced,
    Skipped(SkipReason),
    Failed(SyncError),
}

/// Result of syncing a single entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// The entity as stored after the attempt
    pub entity: JournalEntity,
    pub outcome: SyncOutcome,
}

enum PushError {
    Remote(RemoteError),
    Storage(Error),
}

/// Mutable bookkeeping for the cycle in progress
struct Cycle<'a> {
    user_id: &'a str,
    result: BatchSyncResult,
    /// Credential rejected; no further remote calls this cycle
    halted: bool,
    /// Uploads refused as stale, waiting for the download phase to settle them
    unresolved_conflicts: BTreeMap<EntityId, String>,
}

impl<'a> Cycle<'a> {
    fn new(user_id: &'a str) -> Self {
        Self {
            user_id,
            result: BatchSyncResult::default(),
            halted: false,
            unresolved_conflicts: BTreeMap::new(),
        }
    }

    fn halt(&mut self, entity_id: Option<EntityId>, error: &RemoteError) {
        tracing::warn!("Remote rejected credentials, halting sync: {error}");
        self.halted = true;
        self.result.errors.push(SyncError::remote(entity_id, error));
    }

    fn record_storage(&mut self, entity_id: Option<EntityId>, error: &Error) {
        tracing::error!("Storage failure during sync: {error}");
        self.result.errors.push(SyncError::storage(entity_id, error));
    }
}

/// Clears the in-progress flag however the cycle ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncEngine<S, R, P> {
    store: Arc<S>,
    remote: Arc<R>,
    monitor: Arc<NetworkMonitor<P>>,
    config: SyncEngineConfig,
    running: AtomicBool,
    auto_sync: AtomicBool,
    retry_queue: Mutex<RetryQueue>,
    progress: broadcast::Sender<SyncProgress>,
}

impl<S, R, P> SyncEngine<S, R, P>
where
    S: SyncStore,
    R: RemoteStore,
    P: LivenessProbe,
{
    /// Build an engine; the persisted auto-sync flag is loaded from `store`
    pub fn new(
        store: Arc<S>,
        remote: Arc<R>,
        monitor: Arc<NetworkMonitor<P>>,
        config: SyncEngineConfig,
    ) -> Result<Self> {
        let settings = store.load_settings()?;
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        Ok(Self {
            store,
            remote,
            monitor,
            config,
            running: AtomicBool::new(false),
            auto_sync: AtomicBool::new(settings.auto_sync),
            retry_queue: Mutex::new(RetryQueue::new()),
            progress,
        })
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn monitor(&self) -> &Arc<NetworkMonitor<P>> {
        &self.monitor
    }

    pub const fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    /// Progress events for every cycle from now on. Slow receivers lag
    /// rather than stall the engine.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<SyncProgress> {
        self.progress.subscribe()
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync.load(Ordering::SeqCst)
    }

    /// Persist and apply the auto-sync preference
    pub fn set_auto_sync(&self, enabled: bool) -> Result<()> {
        self.store.save_settings(&SyncSettings {
            auto_sync: enabled,
        })?;
        self.auto_sync.store(enabled, Ordering::SeqCst);
        tracing::info!(
            "Auto sync {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn retry_queue_snapshot(&self) -> Vec<RetryQueueEntry> {
        self.queue().snapshot()
    }

    /// Run one full cycle for `user_id`.
    ///
    /// Returns immediately with `skipped` set when another cycle is in
    /// progress or the network is offline.
    pub async fn run_cycle(&self, user_id: &str) -> BatchSyncResult {
        let Some(_running) = self.try_begin() else {
            tracing::debug!("Sync cycle already in progress, skipping");
            return BatchSyncResult::skipped(SkipReason::AlreadyRunning);
        };
        if !self.monitor.is_online() {
            tracing::debug!("Offline, skipping sync cycle");
            return BatchSyncResult::skipped(SkipReason::Offline);
        }

        let started = Instant::now();
        let mut cycle = Cycle::new(user_id);

        let dirty = self.prepare(&mut cycle);
        self.upload_phase(&mut cycle, &dirty).await;
        self.download_phase(&mut cycle).await;
        self.retry_phase(&mut cycle).await;
        self.finish(cycle, started)
    }

    /// Upload a single entity outside a full cycle.
    ///
    /// Fails only when the entity does not exist for `user_id` or local
    /// storage fails; remote failures are reported in the outcome.
    pub async fn sync_one(&self, user_id: &str, entity_id: &EntityId) -> Result<SyncResult> {
        let entity = self.store.get(user_id, entity_id)?;

        let Some(_running) = self.try_begin() else {
            return Ok(SyncResult {
                entity,
                outcome: SyncOutcome::Skipped(SkipReason::AlreadyRunning),
            });
        };
        if !self.monitor.is_online() {
            return Ok(SyncResult {
                entity,
                outcome: SyncOutcome::Skipped(SkipReason::Offline),
            });
        }
        if !entity.is_dirty() {
            return Ok(SyncResult {
                entity,
                outcome: SyncOutcome::AlreadySynced,
            });
        }

        match self.push(&entity).await {
            Ok(stored) => Ok(SyncResult {
                entity: stored,
                outcome: SyncOutcome::Uploaded,
            }),
            Err(PushError::Remote(error)) => Ok(SyncResult {
                entity: self.store.get(user_id, entity_id)?,
                outcome: SyncOutcome::Failed(SyncError::remote(Some(*entity_id), &error)),
            }),
            Err(PushError::Storage(error)) => Err(error),
        }
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    fn queue(&self) -> MutexGuard<'_, RetryQueue> {
        self.retry_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, progress: SyncProgress) {
        // Only fails when nobody is subscribed
        let _ = self.progress.send(progress);
    }

    fn may_continue(&self, cycle: &mut Cycle<'_>) -> bool {
        if cycle.halted || cycle.result.cancelled {
            return false;
        }
        if !self.monitor.is_online() {
            tracing::warn!("Network went offline, stopping sync cycle early");
            cycle.result.cancelled = true;
            return false;
        }
        true
    }

    async fn call<T>(&self, request: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        tokio::time::timeout(self.config.request_timeout, request)
            .await
            .unwrap_or_else(|_elapsed| Err(RemoteError::Timeout))
    }

    fn log_exchange(&self, entity_id: &str, direction: SyncDirection, error: Option<&str>) {
        let status = if error.is_some() {
            SyncLogStatus::Failed
        } else {
            SyncLogStatus::Success
        };
        if let Err(log_error) =
            self.store
                .append_sync_log(entity_id, direction, status, error, unix_millis_now())
        {
            tracing::warn!("Failed to append sync log entry for {entity_id}: {log_error}");
        }
    }

    fn prepare(&self, cycle: &mut Cycle<'_>) -> Vec<JournalEntity> {
        self.emit(SyncProgress::stage(SyncStage::Preparing, 0));
        self.queue().clear();

        let cutoff = unix_millis_now() - i64::from(self.config.log_retention_days) * DAY_MS;
        match self.store.prune_sync_log(cutoff) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!("Pruned {removed} sync log entries"),
            Err(error) => tracing::warn!("Failed to prune sync log: {error}"),
        }

        match self.store.list_dirty(cycle.user_id) {
            Ok(dirty) => dirty,
            Err(error) => {
                cycle.record_storage(None, &error);
                Vec::new()
            }
        }
    }

    async fn upload_phase(&self, cycle: &mut Cycle<'_>, dirty: &[JournalEntity]) {
        let total = dirty.len();
        self.emit(SyncProgress::stage(SyncStage::Uploading, total));

        for (index, entity) in dirty.iter().enumerate() {
            if !self.may_continue(cycle) {
                break;
            }
            self.emit(SyncProgress::entity(
                SyncStage::Uploading,
                index + 1,
                total,
                &entity.title_preview(TITLE_PREVIEW_LEN),
            ));

            match self.push(entity).await {
                Ok(_) => cycle.result.uploaded += 1,
                Err(PushError::Remote(error)) => self.upload_failed(cycle, entity, error),
                Err(PushError::Storage(error)) => cycle.record_storage(Some(entity.id), &error),
            }
        }
    }

    fn upload_failed(&self, cycle: &mut Cycle<'_>, entity: &JournalEntity, error: RemoteError) {
        if error.is_auth() {
            cycle.halt(Some(entity.id), &error);
        } else if error.is_conflict() {
            tracing::debug!("Upload of {} is stale: {error}", entity.id);
            cycle
                .unresolved_conflicts
                .insert(entity.id, error.to_string());
        } else if error.is_retryable() {
            tracing::debug!("Upload of {} failed, queued for retry: {error}", entity.id);
            self.queue().enqueue(
                entity.id,
                entity.title_preview(TITLE_PREVIEW_LEN),
                Some(error.to_string()),
            );
        } else {
            tracing::warn!("Remote rejected {}: {error}", entity.id);
            cycle
                .result
                .errors
                .push(SyncError::remote(Some(entity.id), &error));
        }
    }

    /// Upload one revision and record the acknowledgement
    async fn push(&self, entity: &JournalEntity) -> std::result::Result<JournalEntity, PushError> {
        let request = UpsertRequest::from(entity);
        let entity_id = entity.id.to_string();

        let ack = match self.call(self.remote.upsert(&request)).await {
            Ok(ack) => ack,
            Err(error) => {
                self.log_exchange(&entity_id, SyncDirection::Upload, Some(&error.to_string()));
                return Err(PushError::Remote(error));
            }
        };

        match self
            .store
            .acknowledge_upload(&entity.id, entity.local_version, &ack)
        {
            Ok(stored) => {
                self.log_exchange(&entity_id, SyncDirection::Upload, None);
                tracing::debug!(
                    "Uploaded {} as {} v{}",
                    entity.id,
                    ack.server_id,
                    ack.server_version
                );
                Ok(stored)
            }
            Err(error) => {
                self.log_exchange(&entity_id, SyncDirection::Upload, Some(&error.to_string()));
                Err(PushError::Storage(error))
            }
        }
    }

    async fn download_phase(&self, cycle: &mut Cycle<'_>) {
        if !self.may_continue(cycle) {
            return;
        }
        self.emit(SyncProgress::stage(SyncStage::Downloading, 0));

        let since = match self.store.sync_cursor(cycle.user_id) {
            Ok(since) => since,
            Err(error) => {
                cycle.record_storage(None, &error);
                return;
            }
        };

        // Writes landing in the cursor's own millisecond are fetched again;
        // records already applied come back as converged no-ops.
        let overlap = since.map(|cursor| cursor - 1);
        let mut records = match self.call(self.remote.list_since(cycle.user_id, overlap)).await {
            Ok(records) => records,
            Err(error) if error.is_auth() => {
                cycle.halt(None, &error);
                return;
            }
            Err(error) => {
                tracing::warn!("Download failed: {error}");
                cycle.result.errors.push(SyncError::remote(None, &error));
                return;
            }
        };
        records.sort_by_key(|record| record.updated_at);

        let total = records.len();
        let mut cursor = since;
        let mut cursor_blocked = false;

        for (index, record) in records.iter().enumerate() {
            if !self.may_continue(cycle) {
                break;
            }
            self.emit(SyncProgress::entity(
                SyncStage::Downloading,
                index + 1,
                total,
                &record.title,
            ));

            match self.pull(cycle, record) {
                Ok(applied) => {
                    if let Some(local_id) = applied {
                        self.log_exchange(&local_id.to_string(), SyncDirection::Download, None);
                    }
                    if !cursor_blocked {
                        cursor = Some(cursor.map_or(record.updated_at, |c| c.max(record.updated_at)));
                    }
                }
                Err(error) => {
                    self.log_exchange(
                        &record.server_id,
                        SyncDirection::Download,
                        Some(&error.to_string()),
                    );
                    // Later records still apply, but must be fetched again next cycle
                    cursor_blocked = true;
                    cycle.record_storage(record.client_id, &error);
                }
            }
        }

        if let Some(cursor) = cursor.filter(|cursor| Some(*cursor) != since) {
            if let Err(error) = self.store.set_sync_cursor(cycle.user_id, cursor) {
                cycle.record_storage(None, &error);
            }
        }
    }

    /// Apply one remote record; returns the local id it changed, if any
    fn pull(&self, cycle: &mut Cycle<'_>, record: &RemoteRecord) -> Result<Option<EntityId>> {
        if record.user_id != cycle.user_id {
            return Err(Error::InvalidInput(format!(
                "remote record {} belongs to another user",
                record.server_id
            )));
        }
        let now = unix_millis_now();

        let Some(local) = self.find_local(cycle.user_id, record)? else {
            let id = record.client_id.unwrap_or_default();
            let stored = self.store.apply_remote(&record.to_entity(id, now))?;
            cycle.result.downloaded += 1;
            tracing::debug!("Downloaded new entity {} from {}", stored.id, record.server_id);
            return Ok(Some(stored.id));
        };

        // With one remote replica, a version we already recorded carries
        // nothing new; a dirty row then only holds edits made after it.
        if local.is_dirty() && record.server_version <= local.remote_version {
            tracing::debug!(
                "Remote v{} of {} already seen, keeping local edits",
                record.server_version,
                local.id
            );
            return Ok(None);
        }

        let resolution = resolve(&local, record, now);
        match resolution.winner {
            Winner::Converged => {
                cycle.unresolved_conflicts.remove(&local.id);
                return Ok(None);
            }
            Winner::Remote => {
                self.store.apply_remote(&resolution.merged)?;
                cycle.result.downloaded += 1;
                if local.is_dirty() {
                    cycle.result.conflicts_resolved += 1;
                    tracing::debug!("Remote revision of {} wins over local edits", local.id);
                }
            }
            Winner::Local => {
                self.store
                    .rebase(&local.id, &record.server_id, record.server_version)?;
                self.queue()
                    .enqueue(local.id, local.title_preview(TITLE_PREVIEW_LEN), None);
                cycle.result.conflicts_resolved += 1;
                tracing::debug!(
                    "Local revision of {} is newer than remote v{}, re-uploading",
                    local.id,
                    record.server_version
                );
            }
        }
        cycle.unresolved_conflicts.remove(&local.id);
        Ok(Some(local.id))
    }

    /// Match by remote id, then by the client id the record was created with
    fn find_local(&self, user_id: &str, record: &RemoteRecord) -> Result<Option<JournalEntity>> {
        if let Some(local) = self.store.find_by_server_id(user_id, &record.server_id)? {
            return Ok(Some(local));
        }
        let Some(client_id) = record.client_id else {
            return Ok(None);
        };
        match self.store.get(user_id, &client_id) {
            Ok(local)
                if local
                    .server_id
                    .as_deref()
                    .map_or(true, |server_id| server_id == record.server_id) =>
            {
                Ok(Some(local))
            }
            Ok(_) | Err(Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn retry_phase(&self, cycle: &mut Cycle<'_>) {
        let queued = self.queue().ids();
        let total = queued.len();
        self.emit(SyncProgress::stage(SyncStage::RetryingFailed, total));

        for (index, entity_id) in queued.into_iter().enumerate() {
            if !self.retry_entity(cycle, entity_id, index + 1, total).await {
                break;
            }
        }
    }

    /// Retry one queued entity until it succeeds, fails for good or runs out
    /// of attempts. Returns `false` when the cycle must stop.
    async fn retry_entity(
        &self,
        cycle: &mut Cycle<'_>,
        entity_id: EntityId,
        position: usize,
        total: usize,
    ) -> bool {
        loop {
            if !self.may_continue(cycle) {
                return false;
            }

            let attempts = self
                .queue()
                .get(&entity_id)
                .map(|entry| entry.attempt_count);
            let Some(attempts) = attempts else {
                return true;
            };
            if attempts >= self.config.max_retries {
                let entry = self.queue().remove(&entity_id);
                if let Some(entry) = entry {
                    tracing::warn!(
                        "Giving up on {} after {} retries",
                        entry.entity_id,
                        entry.attempt_count
                    );
                    cycle.result.errors.push(SyncError::exhausted(&entry));
                }
                return true;
            }

            let delay = backoff_delay(self.config.retry_backoff, attempts);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                if !self.may_continue(cycle) {
                    return false;
                }
            }

            let entity = match self.store.get(cycle.user_id, &entity_id) {
                Ok(entity) if entity.is_dirty() => entity,
                // Deleted, or settled by the download phase
                Ok(_) | Err(Error::NotFound(_)) => {
                    self.queue().remove(&entity_id);
                    return true;
                }
                Err(error) => {
                    self.queue().remove(&entity_id);
                    cycle.record_storage(Some(entity_id), &error);
                    return true;
                }
            };

            self.queue().record_attempt(&entity_id);
            self.emit(SyncProgress::entity(
                SyncStage::RetryingFailed,
                position,
                total,
                &entity.title_preview(TITLE_PREVIEW_LEN),
            ));

            match self.push(&entity).await {
                Ok(_) => {
                    self.queue().remove(&entity_id);
                    cycle.unresolved_conflicts.remove(&entity_id);
                    cycle.result.uploaded += 1;
                    return true;
                }
                Err(PushError::Remote(error)) if error.is_retryable() => {
                    tracing::debug!("Retry of {entity_id} failed: {error}");
                    self.queue().record_failure(&entity_id, error.to_string());
                }
                Err(PushError::Remote(error)) => {
                    self.queue().remove(&entity_id);
                    self.upload_failed(cycle, &entity, error);
                    return !cycle.halted;
                }
                Err(PushError::Storage(error)) => {
                    self.queue().remove(&entity_id);
                    cycle.record_storage(Some(entity_id), &error);
                    return true;
                }
            }
        }
    }

    fn finish(&self, mut cycle: Cycle<'_>, started: Instant) -> BatchSyncResult {
        for (entity_id, message) in std::mem::take(&mut cycle.unresolved_conflicts) {
            cycle.result.errors.push(SyncError {
                entity_id: Some(entity_id),
                kind: SyncErrorKind::Conflict,
                message,
                retryable: false,
            });
        }

        match self.store.list_dirty(cycle.user_id) {
            Ok(dirty) => cycle.result.pending = dirty.len(),
            Err(error) => tracing::warn!("Failed to count pending entities: {error}"),
        }

        let mut result = cycle.result;
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let done = result.uploaded + result.downloaded;
        self.emit(SyncProgress {
            stage: SyncStage::Completed,
            current: done,
            total: done,
            current_entity_title: None,
        });

        if result.errors.is_empty() && !result.cancelled {
            tracing::info!(
                "Sync cycle finished: {} uploaded, {} downloaded, {} pending ({} ms)",
                result.uploaded,
                result.downloaded,
                result.pending,
                result.duration_ms
            );
        } else {
            tracing::warn!(
                "Sync cycle finished with {} error(s){}: {} uploaded, {} downloaded, {} pending",
                result.errors.len(),
                if result.cancelled { ", cancelled" } else { "" },
                result.uploaded,
                result.downloaded,
                result.pending
            );
        }
        result
    }
}
