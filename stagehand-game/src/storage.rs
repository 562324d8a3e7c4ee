use crate::scene::SceneId;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use stagehand_base::hashing::HashMap;
use stagehand_base::StorageError;

/// One addressable slot in persisted storage.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageKey {
    pub region: String,
    pub key: String,
}

impl StorageKey {
    pub fn new(
        region: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        StorageKey {
            region: region.into(),
            key: key.into(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageValue {
    pub data: String,
}

/// Result of one batched storage read, delivered on the game's storage
/// channel and routed to the scene that issued it.
#[derive(Debug)]
pub enum StorageEvent {
    ReadResult {
        scene_id: SceneId,
        result: Result<Vec<StorageValue>, StorageError>,
    },
}

/// Lets a backend report its read result back to the game loop. Dropping it
/// without reporting is surfaced as an error so the waiting scene is not
/// wedged.
pub struct StorageReadCompletion {
    sender: Option<Sender<StorageEvent>>,
    scene_id: SceneId,
}

impl StorageReadCompletion {
    pub(crate) fn new(
        sender: Sender<StorageEvent>,
        scene_id: SceneId,
    ) -> Self {
        StorageReadCompletion {
            sender: Some(sender),
            scene_id,
        }
    }

    pub fn loaded(
        mut self,
        values: Vec<StorageValue>,
    ) {
        let _ = self.sender.take().unwrap().send(StorageEvent::ReadResult {
            scene_id: self.scene_id,
            result: Ok(values),
        });
    }

    pub fn error(
        mut self,
        error: StorageError,
    ) {
        let _ = self.sender.take().unwrap().send(StorageEvent::ReadResult {
            scene_id: self.scene_id,
            result: Err(error),
        });
    }
}

impl Drop for StorageReadCompletion {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(StorageEvent::ReadResult {
                scene_id: self.scene_id,
                result: Err(StorageError::new("storage read dropped without a result")),
            });
        }
    }
}

/// The persisted-storage collaborator boundary. Reads are asynchronous; the
/// backend reports through the completion whenever it has the values.
pub trait StorageBackend: Send {
    fn read(
        &mut self,
        scene_id: SceneId,
        keys: &[StorageKey],
        completion: StorageReadCompletion,
    );
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StorageLoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// Tracks one scene's batched storage read, mirroring what the asset holder
/// does for the scene's asset group. The owning scene gates its milestones on
/// [`StorageLoader::settled`].
pub struct StorageLoader {
    keys: Vec<StorageKey>,
    values: Vec<StorageValue>,
    state: StorageLoadState,
}

impl StorageLoader {
    pub fn new(keys: Vec<StorageKey>) -> Self {
        StorageLoader {
            keys,
            values: Vec::new(),
            state: StorageLoadState::NotLoaded,
        }
    }

    /// Issues the read. Idempotent; only the first call reaches the backend.
    pub fn request(
        &mut self,
        scene_id: SceneId,
        backend: &mut dyn StorageBackend,
        events_tx: &Sender<StorageEvent>,
    ) {
        if self.state != StorageLoadState::NotLoaded {
            return;
        }
        self.state = StorageLoadState::Loading;
        log::debug!(
            "storage read for scene {:?} ({} keys)",
            scene_id,
            self.keys.len()
        );
        let completion = StorageReadCompletion::new(events_tx.clone(), scene_id);
        backend.read(scene_id, &self.keys, completion);
    }

    pub fn on_result(
        &mut self,
        result: Result<Vec<StorageValue>, StorageError>,
    ) {
        if self.state != StorageLoadState::Loading {
            log::trace!("stale storage result, ignoring");
            return;
        }
        match result {
            Ok(values) => {
                self.values = values;
                self.state = StorageLoadState::Loaded;
            }
            Err(error) => {
                // A failed read still settles the loader so the scene is not
                // wedged; it simply sees no values.
                log::warn!("storage read failed: {}", error);
                self.state = StorageLoadState::Failed;
            }
        }
    }

    /// Whether the read has reached a terminal state (loaded or failed).
    pub fn settled(&self) -> bool {
        matches!(
            self.state,
            StorageLoadState::Loaded | StorageLoadState::Failed
        )
    }

    pub fn state(&self) -> StorageLoadState {
        self.state
    }

    pub fn keys(&self) -> &[StorageKey] {
        &self.keys
    }

    pub fn values(&self) -> &[StorageValue] {
        &self.values
    }
}

/// Stock in-memory backend: resolves every read synchronously from a seeded
/// table, missing keys yielding empty values.
#[derive(Default)]
pub struct MemoryStorageBackend {
    values: HashMap<StorageKey, String>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(
        &mut self,
        key: StorageKey,
        data: impl Into<String>,
    ) {
        self.values.insert(key, data.into());
    }
}

impl StorageBackend for MemoryStorageBackend {
    fn read(
        &mut self,
        _scene_id: SceneId,
        keys: &[StorageKey],
        completion: StorageReadCompletion,
    ) {
        let values = keys
            .iter()
            .map(|key| StorageValue {
                data: self.values.get(key).cloned().unwrap_or_default(),
            })
            .collect();
        completion.loaded(values);
    }
}
