// ── Logical registry ──
//
// Persisted name → LogicalGroup maps for sources and receivers. Readers
// get a lock-free `Arc<RegistryData>`; writers are serialized, apply the
// change to a copy, persist it, and only then swap it in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{GroupKind, GroupUpdate, LogicalGroup, RegistryData};

/// The operator's logical source and receiver groups.
pub struct Registry {
    path: PathBuf,
    data: ArcSwap<RegistryData>,
    write_lock: Mutex<()>,
}

impl Registry {
    /// Load the registry file. A missing file is an empty registry; an
    /// unreadable or malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let data = decode(&path, std::fs::read_to_string(&path))?;
        debug!(
            path = %path.display(),
            sources = data.sources.len(),
            receivers = data.receivers.len(),
            "logical registry loaded"
        );
        Ok(Self::with_data(path, data))
    }

    /// Wrap already-loaded data; nothing is read from `path` until a write.
    pub fn with_data(path: impl Into<PathBuf>, data: RegistryData) -> Self {
        Self {
            path: path.into(),
            data: ArcSwap::from_pointee(data),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents.
    pub fn snapshot(&self) -> Arc<RegistryData> {
        self.data.load_full()
    }

    /// Persist the current contents.
    pub async fn save(&self) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let data = self.data.load_full();
        write_file(&self.path, &data).await
    }

    /// Re-read the file, which another process may have edited, and swap
    /// its contents in when they differ from what is loaded. Returns
    /// whether anything changed. A malformed file leaves the loaded data
    /// untouched.
    pub async fn reload(&self) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let data = decode(&self.path, tokio::fs::read_to_string(&self.path).await)?;
        if data == **self.data.load() {
            return Ok(false);
        }

        info!(
            path = %self.path.display(),
            sources = data.sources.len(),
            receivers = data.receivers.len(),
            "logical registry changed on disk"
        );
        self.data.store(Arc::new(data));
        Ok(true)
    }

    /// Insert or update a group and persist. Returns the group's ID.
    pub async fn add_or_update(
        &self,
        kind: GroupKind,
        update: GroupUpdate,
    ) -> Result<u32, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = RegistryData::clone(&self.data.load());
        let name = update.name.clone();
        let id = apply_update(&mut next, kind, update)?;

        write_file(&self.path, &next).await?;
        self.data.store(Arc::new(next));
        info!(kind = %kind, name, id, "logical group saved");
        Ok(id)
    }

    /// Remove a group by name and persist.
    pub async fn delete(&self, kind: GroupKind, name: &str) -> Result<LogicalGroup, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = RegistryData::clone(&self.data.load());
        let removed = next
            .groups_mut(kind)
            .shift_remove(name)
            .ok_or_else(|| CoreError::not_found(kind.singular(), name))?;

        write_file(&self.path, &next).await?;
        self.data.store(Arc::new(next));
        info!(kind = %kind, name, id = removed.id, "logical group deleted");
        Ok(removed)
    }

    /// Look up a group by ID.
    pub fn find(&self, kind: GroupKind, id: u32) -> Option<(String, LogicalGroup)> {
        self.data
            .load()
            .find(kind, id)
            .map(|(name, group)| (name.to_owned(), group.clone()))
    }

    /// Look up a source and a receiver by ID in one consistent read.
    pub fn resolve_pair(
        &self,
        source_id: u32,
        receiver_id: u32,
    ) -> (Option<(String, LogicalGroup)>, Option<(String, LogicalGroup)>) {
        let data = self.data.load();
        let own = |(name, group): (&str, &LogicalGroup)| (name.to_owned(), group.clone());
        (
            data.find(GroupKind::Sources, source_id).map(own),
            data.find(GroupKind::Receivers, receiver_id).map(own),
        )
    }

    /// All groups of a kind, sorted by ID.
    pub fn list(&self, kind: GroupKind) -> Vec<(String, LogicalGroup)> {
        let mut groups: Vec<(String, LogicalGroup)> = self
            .data
            .load()
            .groups(kind)
            .iter()
            .map(|(name, group)| (name.clone(), group.clone()))
            .collect();
        groups.sort_by_key(|(_, g)| g.id);
        groups
    }
}

// ── Mutation rules ───────────────────────────────────────────────────

fn apply_update(
    data: &mut RegistryData,
    kind: GroupKind,
    update: GroupUpdate,
) -> Result<u32, CoreError> {
    let GroupUpdate {
        name,
        original_name,
        id,
        video,
        audio,
        data: anc,
    } = update;

    let name = name.trim().to_owned();
    if name.is_empty() {
        return Err(CoreError::Config {
            message: format!("{} name must not be empty", kind.singular()),
        });
    }

    // The key being replaced: the old name on rename, else the name itself.
    let previous = original_name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| name.clone());

    let groups = data.groups_mut(kind);

    if previous != name && groups.contains_key(&name) {
        return Err(CoreError::Config {
            message: format!("{} '{name}' already exists", kind.singular()),
        });
    }

    let id = match id {
        Some(id) => {
            if let Some((holder, _)) = groups
                .iter()
                .find(|(n, g)| g.id == id && **n != previous)
            {
                return Err(CoreError::DuplicateId {
                    kind: kind.singular().to_owned(),
                    id,
                    holder: holder.clone(),
                });
            }
            id
        }
        None => match groups.get(&previous) {
            Some(existing) => existing.id,
            None => match groups.values().map(|g| g.id).max() {
                None => 1,
                Some(max) => max.checked_add(1).ok_or_else(|| CoreError::Config {
                    message: format!(
                        "no free {} ID after {max}; give an explicit ID",
                        kind.singular()
                    ),
                })?,
            },
        },
    };

    let group = LogicalGroup {
        id,
        video: non_empty(video),
        audio: non_empty(audio),
        data: non_empty(anc),
    };

    if previous == name {
        groups.insert(name, group);
    } else {
        groups.shift_remove(&previous);
        groups.insert(name, group);
    }
    Ok(id)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ── File I/O ─────────────────────────────────────────────────────────

fn decode(path: &Path, read: std::io::Result<String>) -> Result<RegistryData, CoreError> {
    let raw = match read {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RegistryData::default()),
        Err(e) => {
            return Err(CoreError::Registry {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    serde_json::from_str(&raw).map_err(|e| CoreError::Registry {
        path: path.display().to_string(),
        message: format!("malformed registry file: {e}"),
    })
}

async fn write_file(path: &Path, data: &RegistryData) -> Result<(), CoreError> {
    let registry_err = |message: String| CoreError::Registry {
        path: path.display().to_string(),
        message,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| registry_err(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(data).map_err(|e| registry_err(e.to_string()))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| registry_err(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Essence;
    use pretty_assertions::assert_eq;

    fn registry(dir: &tempfile::TempDir) -> Registry {
        Registry::load(dir.path().join("logical.json")).unwrap()
    }

    #[tokio::test]
    async fn ids_are_allocated_max_plus_one() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);

        assert_eq!(reg.add_or_update(GroupKind::Sources, GroupUpdate::new("CAM1")).await.unwrap(), 1);
        assert_eq!(
            reg.add_or_update(GroupKind::Sources, GroupUpdate::new("CAM5").with_id(5))
                .await
                .unwrap(),
            5
        );
        assert_eq!(reg.add_or_update(GroupKind::Sources, GroupUpdate::new("CAM6")).await.unwrap(), 6);
        // Receivers number independently.
        assert_eq!(reg.add_or_update(GroupKind::Receivers, GroupUpdate::new("PGM")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_explicit_id_is_rejected_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.add_or_update(GroupKind::Sources, GroupUpdate::new("CAM1").with_id(1))
            .await
            .unwrap();
        let before = reg.snapshot();

        let err = reg
            .add_or_update(GroupKind::Sources, GroupUpdate::new("CAM2").with_id(1))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::DuplicateId { id: 1, ref holder, .. } if holder == "CAM1"));
        assert_eq!(*reg.snapshot(), *before);
        assert_eq!(*Registry::load(reg.path()).unwrap().snapshot(), *before);
    }

    #[tokio::test]
    async fn updating_same_name_keeps_id_and_replaces_essences() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.add_or_update(
            GroupKind::Sources,
            GroupUpdate::new("CAM1").with_id(7).with_device(Essence::Video, "s-1"),
        )
        .await
        .unwrap();

        let id = reg
            .add_or_update(
                GroupKind::Sources,
                GroupUpdate::new("CAM1").with_device(Essence::Audio, "s-2"),
            )
            .await
            .unwrap();

        assert_eq!(id, 7);
        let (_, group) = reg.find(GroupKind::Sources, 7).unwrap();
        assert_eq!(group.video, None);
        assert_eq!(group.audio.as_deref(), Some("s-2"));
    }

    #[tokio::test]
    async fn rename_keeps_id() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.add_or_update(GroupKind::Receivers, GroupUpdate::new("MON 1").with_id(3))
            .await
            .unwrap();

        let id = reg
            .add_or_update(
                GroupKind::Receivers,
                GroupUpdate::new("MON A").renamed_from("MON 1"),
            )
            .await
            .unwrap();

        assert_eq!(id, 3);
        let names: Vec<String> = reg.list(GroupKind::Receivers).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["MON A".to_owned()]);
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        let err = reg.delete(GroupKind::Sources, "nope").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn save_load_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logical.json");
        std::fs::write(
            &path,
            r#"{
  "sources": {
    "CAM2": { "id": 2, "video": "s-2" },
    "CAM1": { "id": 1, "video": "s-1", "audio": "s-1a" }
  },
  "receivers": {
    "PGM": { "id": 1, "video": "r-200" }
  }
}"#,
        )
        .unwrap();

        let reg = Registry::load(&path).unwrap();
        let original = reg.snapshot();
        reg.save().await.unwrap();

        let reloaded = Registry::load(&path).unwrap();
        assert_eq!(*reloaded.snapshot(), *original);
        let names: Vec<&String> = original.sources.keys().collect();
        assert_eq!(names, ["CAM2", "CAM1"]);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logical.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Registry::load(&path).err().unwrap();
        assert!(matches!(err, CoreError::Registry { .. }));
    }

    #[test]
    fn list_is_sorted_by_id() {
        let mut data = RegistryData::default();
        apply_update(&mut data, GroupKind::Sources, GroupUpdate::new("B").with_id(9)).unwrap();
        apply_update(&mut data, GroupKind::Sources, GroupUpdate::new("A").with_id(2)).unwrap();
        let reg = Registry::with_data("unused.json", data);

        let ids: Vec<u32> = reg.list(GroupKind::Sources).iter().map(|(_, g)| g.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[tokio::test]
    async fn id_allocation_after_u32_max_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.add_or_update(GroupKind::Sources, GroupUpdate::new("MAX").with_id(u32::MAX))
            .await
            .unwrap();
        let before = reg.snapshot();

        let err = reg
            .add_or_update(GroupKind::Sources, GroupUpdate::new("NEXT"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Config { .. }));
        assert_eq!(*reg.snapshot(), *before);
        // An explicit ID still works.
        assert_eq!(
            reg.add_or_update(GroupKind::Sources, GroupUpdate::new("NEXT").with_id(4))
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn reload_picks_up_edits_from_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.add_or_update(GroupKind::Sources, GroupUpdate::new("CAM1"))
            .await
            .unwrap();
        assert!(!reg.reload().await.unwrap());

        let other = registry(&dir);
        other
            .add_or_update(GroupKind::Sources, GroupUpdate::new("CAM2"))
            .await
            .unwrap();

        assert!(reg.reload().await.unwrap());
        let names: Vec<String> = reg.list(GroupKind::Sources).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["CAM1", "CAM2"]);
        assert!(!reg.reload().await.unwrap());
    }

    #[tokio::test]
    async fn reload_keeps_data_when_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.add_or_update(GroupKind::Receivers, GroupUpdate::new("PGM"))
            .await
            .unwrap();
        std::fs::write(reg.path(), "{ not json").unwrap();

        assert!(matches!(reg.reload().await, Err(CoreError::Registry { .. })));
        assert!(reg.find(GroupKind::Receivers, 1).is_some());
    }
}
