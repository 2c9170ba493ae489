//! Whole-record last-writer-wins conflict resolution.
//!
//! The newer `updated_at` wins outright; ties fall back to the remote
//! version, and a tie on both means the replicas already agree. Fields are never
//! merged: the losing revision's independent changes are discarded.

use std::cmp::Ordering;

use crate::models::{JournalEntity, SyncStatus};
use crate::remote::RemoteRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// Local revision stands and must be uploaded over the remote one
    Local,
    /// Remote revision replaces the local one
    Remote,
    /// Same timestamp and version: nothing to do
    Converged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub winner: Winner,
    /// The entity as it should look after the decision is applied
    pub merged: JournalEntity,
}

/// Decide between a local entity and the remote revision of the same record
#[must_use]
pub fn resolve(local: &JournalEntity, remote: &RemoteRecord, now: i64) -> Resolution {
    let winner = match remote.updated_at.cmp(&local.updated_at) {
        Ordering::Greater => Winner::Remote,
        Ordering::Less => Winner::Local,
        Ordering::Equal => match remote.server_version.cmp(&local.remote_version) {
            Ordering::Greater => Winner::Remote,
            Ordering::Less => Winner::Local,
            Ordering::Equal => Winner::Converged,
        },
    };

    let merged = match winner {
        Winner::Remote => {
            let mut merged = remote.to_entity(local.id, now);
            let version = local.local_version.max(remote.server_version);
            merged.local_version = version;
            merged.server_version = version;
            merged.remote_version = remote.server_version;
            merged.created_at = local.created_at;
            merged
        }
        Winner::Local => JournalEntity {
            server_id: Some(remote.server_id.clone()),
            remote_version: local.remote_version.max(remote.server_version),
            sync_status: if local.sync_status == SyncStatus::Synced {
                SyncStatus::Pending
            } else {
                local.sync_status
            },
            ..local.clone()
        },
        Winner::Converged => local.clone(),
    };

    Resolution { winner, merged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryContent, NewEntity};
    use pretty_assertions::assert_eq;

    fn local(updated_at: i64, remote_version: i64) -> JournalEntity {
        let mut entity = JournalEntity::new(
            "u1",
            NewEntity::new("Local", EntryContent::journal("mine")).with_tags(["home"]),
        )
        .unwrap();
        entity.updated_at = updated_at;
        entity.created_at = 10;
        entity.local_version = 2;
        entity.server_version = remote_version;
        entity.remote_version = remote_version;
        entity.server_id = Some("srv-1".into());
        entity.sync_status = SyncStatus::Pending;
        entity
    }

    fn remote(updated_at: i64, server_version: i64) -> RemoteRecord {
        RemoteRecord {
            server_id: "srv-1".into(),
            client_id: None,
            user_id: "u1".into(),
            title: "Remote".into(),
            content: EntryContent::journal("theirs"),
            tags: ["work".to_string()].into_iter().collect(),
            is_favorite: true,
            is_archived: false,
            server_version,
            created_at: 99,
            updated_at,
        }
    }

    #[test]
    fn newer_remote_replaces_everything() {
        let local = local(1_000, 1);
        let resolution = resolve(&local, &remote(2_000, 3), 5_000);

        assert_eq!(resolution.winner, Winner::Remote);
        let merged = resolution.merged;
        assert_eq!(merged.id, local.id);
        assert_eq!(merged.title, "Remote");
        assert_eq!(merged.content, EntryContent::journal("theirs"));
        assert_eq!(merged.tags, remote(0, 0).tags);
        assert!(merged.is_favorite);
        assert_eq!(merged.sync_status, SyncStatus::Synced);
        assert_eq!(merged.local_version, 3);
        assert_eq!(merged.server_version, 3);
        assert_eq!(merged.remote_version, 3);
        assert_eq!(merged.synced_at, Some(5_000));
        assert_eq!(merged.created_at, 10);
    }

    #[test]
    fn remote_win_never_lowers_local_version() {
        let mut local = local(1_000, 1);
        local.local_version = 7;
        let merged = resolve(&local, &remote(2_000, 2), 0).merged;
        assert_eq!(merged.local_version, 7);
        assert_eq!(merged.server_version, 7);
        // Only the remote's own number may be sent back as an upload base
        assert_eq!(merged.remote_version, 2);
    }

    #[test]
    fn newer_local_keeps_content_and_adopts_remote_version() {
        let local = local(3_000, 1);
        let resolution = resolve(&local, &remote(2_000, 4), 5_000);

        assert_eq!(resolution.winner, Winner::Local);
        let merged = resolution.merged;
        assert_eq!(merged.title, "Local");
        assert_eq!(merged.content, EntryContent::journal("mine"));
        assert_eq!(merged.remote_version, 4);
        assert_eq!(merged.server_version, 1);
        assert_eq!(merged.sync_status, SyncStatus::Pending);
        assert_eq!(merged.local_version, local.local_version);
    }

    #[test]
    fn newer_local_that_looked_synced_is_flagged_for_upload() {
        let mut local = local(3_000, 1);
        local.sync_status = SyncStatus::Synced;
        let merged = resolve(&local, &remote(2_000, 1), 0).merged;
        assert_eq!(merged.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn timestamp_tie_breaks_on_server_version() {
        assert_eq!(
            resolve(&local(2_000, 1), &remote(2_000, 2), 0).winner,
            Winner::Remote
        );
        assert_eq!(
            resolve(&local(2_000, 3), &remote(2_000, 2), 0).winner,
            Winner::Local
        );
    }

    #[test]
    fn tie_break_ignores_locally_raised_server_version() {
        let mut local = local(2_000, 2);
        local.local_version = 9;
        local.server_version = 9;
        assert_eq!(resolve(&local, &remote(2_000, 3), 0).winner, Winner::Remote);
    }

    #[test]
    fn full_tie_is_converged_noop() {
        let local = local(2_000, 2);
        let resolution = resolve(&local, &remote(2_000, 2), 0);
        assert_eq!(resolution.winner, Winner::Converged);
        assert_eq!(resolution.merged, local);
    }
}
