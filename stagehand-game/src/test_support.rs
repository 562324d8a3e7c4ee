use crate::game::Game;
use crate::scene::SceneId;
use crate::storage::{StorageBackend, StorageKey, StorageReadCompletion, StorageValue};
use stagehand_base::hashing::{HashMap, HashSet};
use stagehand_base::{
    AssetConfiguration, AssetId, AssetLoadError, AssetType, GameManifest, Trigger,
};
use stagehand_loader::{LoadCompletion, Resource, ResourceFactory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MANIFEST_JSON: &str = r#"
{
    "assets": {
        "foo": {
            "path": "assets/image/foo.png",
            "virtualPath": "image/foo.png",
            "type": "image",
            "width": 1,
            "height": 1
        },
        "zoo": {
            "path": "assets/audio/zoo.ogg",
            "virtualPath": "audio/zoo.ogg",
            "type": "audio",
            "duration": 1984,
            "systemId": "music"
        },
        "boot": {
            "path": "assets/script/boot.js",
            "virtualPath": "script/boot.js",
            "type": "script",
            "global": true
        }
    },
    "audioSystems": {
        "music": {
            "loop": true
        }
    }
}
"#;

/// Scripting/observation state shared by the fake factory and its resources.
#[derive(Default)]
pub struct FactoryState {
    pub create_calls: Vec<AssetId>,
    pub failures: HashMap<AssetId, u32>,
    pub permanent_failures: HashSet<AssetId>,
    pub manual_ids: HashSet<AssetId>,
    pub parked: Vec<(AssetId, LoadCompletion)>,
}

impl FactoryState {
    pub fn complete_parked(
        state: &Arc<Mutex<FactoryState>>,
        id: &AssetId,
    ) {
        let parked = {
            let mut state = state.lock().unwrap();
            let index = state
                .parked
                .iter()
                .position(|(parked_id, _)| parked_id == id)
                .unwrap_or_else(|| panic!("no parked load for {}", id));
            state.parked.remove(index).1
        };
        parked.complete();
    }
}

struct FakeResource {
    id: AssetId,
    path: String,
    resource_type: AssetType,
    destroyed: bool,
    state: Arc<Mutex<FactoryState>>,
}

impl Resource for FakeResource {
    fn id(&self) -> &AssetId {
        &self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn resource_type(&self) -> AssetType {
        self.resource_type
    }

    fn load(
        &mut self,
        op: LoadCompletion,
    ) {
        let mut state = self.state.lock().unwrap();
        if state.manual_ids.contains(&self.id) {
            state.parked.push((self.id.clone(), op));
            return;
        }
        if state.permanent_failures.contains(&self.id) {
            drop(state);
            op.error(AssetLoadError::permanent(format!(
                "scripted permanent failure for {}",
                self.id
            )));
            return;
        }
        if let Some(remaining) = state.failures.get_mut(&self.id) {
            if *remaining > 0 {
                *remaining -= 1;
                drop(state);
                op.error(AssetLoadError::retriable(format!(
                    "scripted failure for {}",
                    self.id
                )));
                return;
            }
        }
        drop(state);
        op.complete();
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }

    fn destroyed(&self) -> bool {
        self.destroyed
    }
}

struct FakeFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl FakeFactory {
    fn create(
        &mut self,
        id: &AssetId,
        path: &str,
        resource_type: AssetType,
    ) -> Box<dyn Resource> {
        self.state.lock().unwrap().create_calls.push(id.clone());
        Box::new(FakeResource {
            id: id.clone(),
            path: path.to_string(),
            resource_type,
            destroyed: false,
            state: self.state.clone(),
        })
    }
}

impl ResourceFactory for FakeFactory {
    fn create_image_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _width: u32,
        _height: u32,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Image)
    }

    fn create_audio_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _duration: f64,
        _loop_audio: bool,
        _hint: Option<&str>,
        _system_id: Option<&str>,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Audio)
    }

    fn create_text_resource(
        &mut self,
        id: &AssetId,
        path: &str,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Text)
    }

    fn create_script_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _virtual_path: &str,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Script)
    }

    fn create_video_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _width: u32,
        _height: u32,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Video)
    }
}

#[derive(Default)]
struct StorageState {
    manual: bool,
    values: HashMap<StorageKey, String>,
    parked: Vec<(Vec<StorageKey>, StorageReadCompletion)>,
}

/// Test handle over the storage backend: seed values, flip into manual mode,
/// release parked reads.
#[derive(Clone)]
pub struct ManualStorage {
    state: Arc<Mutex<StorageState>>,
}

impl ManualStorage {
    pub fn set_manual(
        &self,
        manual: bool,
    ) {
        self.state.lock().unwrap().manual = manual;
    }

    pub fn seed(
        &self,
        key: StorageKey,
        data: impl Into<String>,
    ) {
        self.state.lock().unwrap().values.insert(key, data.into());
    }

    pub fn release_all(&self) {
        let parked = {
            let mut state = self.state.lock().unwrap();
            std::mem::take(&mut state.parked)
        };
        for (keys, completion) in parked {
            let values = self.resolve(&keys);
            completion.loaded(values);
        }
    }

    fn resolve(
        &self,
        keys: &[StorageKey],
    ) -> Vec<StorageValue> {
        let state = self.state.lock().unwrap();
        keys.iter()
            .map(|key| StorageValue {
                data: state.values.get(key).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

struct ScriptedStorageBackend {
    state: Arc<Mutex<StorageState>>,
}

impl StorageBackend for ScriptedStorageBackend {
    fn read(
        &mut self,
        _scene_id: SceneId,
        keys: &[StorageKey],
        completion: StorageReadCompletion,
    ) {
        let mut state = self.state.lock().unwrap();
        if state.manual {
            state.parked.push((keys.to_vec(), completion));
            return;
        }
        let values = keys
            .iter()
            .map(|key| StorageValue {
                data: state.values.get(key).cloned().unwrap_or_default(),
            })
            .collect();
        drop(state);
        completion.loaded(values);
    }
}

/// A game over the standard test manifest (image `foo`, audio `zoo`, global
/// script `boot`) with a scriptable factory and storage backend.
pub fn game_fixture() -> (Game, Arc<Mutex<FactoryState>>, ManualStorage) {
    let manifest = GameManifest::from_json(MANIFEST_JSON).unwrap();
    let configuration = AssetConfiguration::normalize(&manifest).unwrap();

    let factory_state = Arc::new(Mutex::new(FactoryState::default()));
    let factory = Box::new(FakeFactory {
        state: factory_state.clone(),
    });

    let storage_state = Arc::new(Mutex::new(StorageState::default()));
    let backend = Box::new(ScriptedStorageBackend {
        state: storage_state.clone(),
    });

    let game = Game::new(configuration, factory, backend);
    (game, factory_state, ManualStorage { state: storage_state })
}

/// Registers a counting handler on a trigger and returns the counter.
pub fn trigger_counter<T: 'static>(trigger: &mut Trigger<T>) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    trigger.add(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        false
    });
    count
}
