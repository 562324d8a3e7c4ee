use stagehand::base::{AssetConfiguration, AssetId, AssetType, GameManifest};
use stagehand::game::{Game, MemoryStorageBackend, Scene, SceneParameters, StorageKey};
use stagehand::loader::{LoadCompletion, Resource, ResourceFactory};
use std::time::Duration;

const MANIFEST_JSON: &str = r#"
{
    "assets": {
        "logo": {
            "path": "assets/image/logo.png",
            "virtualPath": "image/logo.png",
            "type": "image",
            "width": 256,
            "height": 64,
            "global": true
        },
        "hero": {
            "path": "assets/image/hero.png",
            "virtualPath": "image/hero.png",
            "type": "image",
            "width": 64,
            "height": 64
        },
        "bgm": {
            "path": "assets/audio/bgm.ogg",
            "virtualPath": "audio/bgm.ogg",
            "type": "audio",
            "duration": 92.5,
            "systemId": "music"
        },
        "intro": {
            "path": "assets/text/intro.txt",
            "virtualPath": "text/intro.txt",
            "type": "text"
        }
    },
    "audioSystems": {
        "music": {
            "loop": true,
            "hint": "stream"
        }
    }
}
"#;

/// A resource that "reads" its file on a spawned IO thread and reports back
/// over the completion, standing in for a real decoder backend.
struct ThreadedResource {
    id: AssetId,
    path: String,
    resource_type: AssetType,
    destroyed: bool,
}

impl Resource for ThreadedResource {
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
        let path = self.path.clone();
        std::thread::Builder::new()
            .name("Asset IO Thread".into())
            .spawn(move || {
                // Simulated read latency
                std::thread::sleep(Duration::from_millis(20));
                log::debug!("finished reading {}", path);
                op.complete();
            })
            .unwrap();
    }

    fn destroy(&mut self) {
        log::debug!("destroy {}", self.id);
        self.destroyed = true;
    }

    fn destroyed(&self) -> bool {
        self.destroyed
    }
}

struct ThreadedResourceFactory;

impl ThreadedResourceFactory {
    fn create(
        &self,
        id: &AssetId,
        path: &str,
        resource_type: AssetType,
    ) -> Box<dyn Resource> {
        log::debug!("create {} resource {} ({})", resource_type, id, path);
        Box::new(ThreadedResource {
            id: id.clone(),
            path: path.to_string(),
            resource_type,
            destroyed: false,
        })
    }
}

impl ResourceFactory for ThreadedResourceFactory {
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

fn run_until(
    game: &mut Game,
    what: &str,
    done: impl Fn(&Game) -> bool,
) {
    for _ in 0..600 {
        game.tick();
        if done(game) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {}", what);
}

fn main() {
    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(log::LevelFilter::Debug)
        .init();

    let manifest = GameManifest::from_json(MANIFEST_JSON).unwrap();
    let configuration = AssetConfiguration::normalize(&manifest).unwrap();

    let mut storage = MemoryStorageBackend::new();
    storage.set(StorageKey::new("save", "slot0"), "stage=3");

    let mut game = Game::new(
        configuration,
        Box::new(ThreadedResourceFactory),
        Box::new(storage),
    );

    // The title scene wants the intro text plus the save-game slot; the
    // global logo loads before it is even pushed.
    let mut title = Scene::new(
        &game,
        SceneParameters {
            name: "title".to_string(),
            asset_ids: vec![AssetId::new("intro")],
            storage_keys: vec![StorageKey::new("save", "slot0")],
            ..Default::default()
        },
    );
    title.loaded.add_once(|_| {
        println!("title scene loaded");
        false
    });
    game.start(title);
    run_until(&mut game, "the title scene", |game| {
        game.scene()
            .map(|s| s.name() == "title" && s.loaded_fired())
            .unwrap_or(false)
    });
    println!(
        "save data: {}",
        game.scene().unwrap().storage_values()[0].data
    );

    // Push the stage; the loading scene shows while hero/bgm stream in.
    let mut stage = Scene::new(
        &game,
        SceneParameters {
            name: "stage".to_string(),
            asset_ids: vec![AssetId::new("hero"), AssetId::new("bgm")],
            ..Default::default()
        },
    );
    stage.ready.add_once(|_| {
        println!("stage scene ready");
        false
    });
    stage.loaded.add_once(|_| {
        println!("stage scene loaded");
        false
    });
    game.push_scene(stage);
    run_until(&mut game, "the stage scene", |game| {
        game.scene()
            .map(|s| s.name() == "stage" && s.loaded_fired())
            .unwrap_or(false)
    });

    // Pop back to the title, then swap it for the credits.
    game.pop_scene();
    game.tick();
    println!("back on {}", game.scene().unwrap().name());

    let credits = Scene::new(&game, SceneParameters::named("credits"));
    game.replace_scene(credits, false);
    run_until(&mut game, "the credits scene", |game| {
        game.scene()
            .map(|s| s.name() == "credits" && s.loaded_fired())
            .unwrap_or(false)
    });

    game.terminate();
    println!("done");
}
