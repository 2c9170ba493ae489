//! In-memory remote store used by the engine and monitor tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    LivenessProbe, RemoteError, RemoteRecord, RemoteResult, RemoteStore, UpsertAck, UpsertRequest,
};
use crate::util::unix_millis_now;

#[derive(Default)]
struct State {
    records: BTreeMap<String, RemoteRecord>,
    next_id: u64,
    /// Failures handed out to the next upserts, in order
    upload_failures: VecDeque<RemoteError>,
    list_failure: Option<RemoteError>,
    latency: Option<Duration>,
    probe_latency: Option<Duration>,
}

/// Server-side versioning mirrors the real API: a write gets
/// `max(previous + 1, local_version)` and a fresh `updated_at`, and a write
/// based on an older version than the stored one is refused as a conflict.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<State>,
    unreachable: AtomicBool,
    upsert_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory remote lock poisoned")
    }

    pub fn fail_next_uploads(&self, count: usize, error: &RemoteError) {
        let mut state = self.state();
        for _ in 0..count {
            state.upload_failures.push_back(error.clone());
        }
    }

    pub fn set_list_failure(&self, error: Option<RemoteError>) {
        self.state().list_failure = error;
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    pub fn set_probe_latency(&self, latency: Option<Duration>) {
        self.state().probe_latency = latency;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn record(&self, server_id: &str) -> Option<RemoteRecord> {
        self.state().records.get(server_id).cloned()
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.state().records.values().cloned().collect()
    }

    /// Seed or overwrite a record as if another device wrote it
    pub fn put_record(&self, record: RemoteRecord) {
        self.state()
            .records
            .insert(record.server_id.clone(), record);
    }

    /// Edit a record in place as another device would, bumping its version
    pub fn edit_record(&self, server_id: &str, edit: impl FnOnce(&mut RemoteRecord)) {
        let mut state = self.state();
        let record = state
            .records
            .get_mut(server_id)
            .expect("record to edit must exist");
        edit(record);
        record.server_version += 1;
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn upsert(&self, request: &UpsertRequest) -> RemoteResult<UpsertAck> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".into()));
        }

        let mut state = self.state();
        if let Some(error) = state.upload_failures.pop_front() {
            return Err(error);
        }

        let server_id = if let Some(server_id) = request.server_id.clone() {
            server_id
        } else {
            state.next_id += 1;
            format!("srv-{}", state.next_id)
        };

        let previous = state.records.get(&server_id);
        if let Some(record) = previous {
            if record.server_version > request.base_version {
                return Err(RemoteError::Conflict(format!(
                    "{server_id} is at version {}, request was based on {}",
                    record.server_version, request.base_version
                )));
            }
        }
        let server_version = previous.map_or(request.local_version.max(1), |record| {
            (record.server_version + 1).max(request.local_version)
        });
        let updated_at = previous.map_or(unix_millis_now(), |record| {
            unix_millis_now().max(record.updated_at + 1)
        });
        let created_at = previous.map_or(request.created_at, |record| record.created_at);

        let record = RemoteRecord {
            server_id: server_id.clone(),
            client_id: Some(request.client_id),
            user_id: request.user_id.clone(),
            title: request.title.clone(),
            content: request.content.clone(),
            tags: request.tags.clone(),
            is_favorite: request.is_favorite,
            is_archived: request.is_archived,
            server_version,
            created_at,
            updated_at,
        };
        state.records.insert(server_id.clone(), record);

        Ok(UpsertAck {
            server_id,
            server_version,
            updated_at,
        })
    }

    async fn list_since(&self, user_id: &str, since: Option<i64>) -> RemoteResult<Vec<RemoteRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".into()));
        }

        let state = self.state();
        if let Some(error) = state.list_failure.clone() {
            return Err(error);
        }

        let mut records: Vec<RemoteRecord> = state
            .records
            .values()
            .filter(|record| record.user_id == user_id)
            .filter(|record| since.map_or(true, |since| record.updated_at > since))
            .cloned()
            .collect();
        records.sort_by_key(|record| record.updated_at);
        Ok(records)
    }
}

impl LivenessProbe for MemoryRemoteStore {
    async fn probe(&self) -> RemoteResult<()> {
        let latency = self.state().probe_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            Err(RemoteError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}
