use crate::hashing::HashMap;
use crate::{AssetId, AssetType, ManifestError};
use serde::{Deserialize, Serialize};

/// One asset entry from the static game manifest.
///
/// Most fields are optional at the serde layer; [`AssetConfiguration::normalize`]
/// is where the per-type requirements are enforced.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetDescriptor {
    pub path: String,
    pub virtual_path: String,
    #[serde(rename = "type")]
    pub asset_type: Option<AssetType>,
    /// Global assets are loaded once at game start and outlive every scene.
    pub global: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
    #[serde(rename = "loop")]
    pub loop_audio: Option<bool>,
    pub hint: Option<String>,
    pub system_id: Option<String>,
}

/// Per-audio-system defaults that audio descriptors inherit when they do not
/// set `loop`/`hint` themselves.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSystemConfiguration {
    #[serde(rename = "loop")]
    pub loop_audio: Option<bool>,
    pub hint: Option<String>,
}

/// The slice of the game manifest this subsystem consumes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameManifest {
    pub assets: HashMap<AssetId, AssetDescriptor>,
    pub audio_systems: HashMap<String, AudioSystemConfiguration>,
}

impl GameManifest {
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest = serde_json::from_str(json)?;
        Ok(manifest)
    }
}

/// An ad hoc asset declaration, requested at runtime instead of coming from
/// the static manifest. Dynamic assets skip manifest normalization and are
/// exempt from the fatal-on-exhaustion escalation policy.
#[derive(Clone, Debug)]
pub struct DynamicAssetDescriptor {
    pub id: AssetId,
    pub descriptor: AssetDescriptor,
}

/// The manifest's asset table after the one-time normalization pass. Immutable
/// afterwards; the asset manager resolves every statically declared request
/// against this.
#[derive(Clone, Debug, Default)]
pub struct AssetConfiguration {
    descriptors: HashMap<AssetId, AssetDescriptor>,
}

impl AssetConfiguration {
    /// Validates and completes every manifest entry:
    /// - `path`, `virtualPath` and `type` are required for all assets,
    /// - image/video assets must carry numeric width/height,
    /// - audio assets inherit `loop`/`hint` from their audio system's
    ///   defaults when unset.
    pub fn normalize(manifest: &GameManifest) -> Result<Self, ManifestError> {
        let mut descriptors = HashMap::default();

        for (id, descriptor) in &manifest.assets {
            let mut descriptor = descriptor.clone();

            if descriptor.path.is_empty() {
                return Err(ManifestError::MissingField(id.clone(), "path"));
            }
            if descriptor.virtual_path.is_empty() {
                return Err(ManifestError::MissingField(id.clone(), "virtualPath"));
            }
            let asset_type = match descriptor.asset_type {
                Some(asset_type) => asset_type,
                None => return Err(ManifestError::MissingField(id.clone(), "type")),
            };

            match asset_type {
                AssetType::Image | AssetType::Video => {
                    if descriptor.width.is_none() {
                        return Err(ManifestError::MissingField(id.clone(), "width"));
                    }
                    if descriptor.height.is_none() {
                        return Err(ManifestError::MissingField(id.clone(), "height"));
                    }
                }
                AssetType::Audio => {
                    if let Some(system_id) = &descriptor.system_id {
                        let system = manifest.audio_systems.get(system_id).ok_or_else(|| {
                            ManifestError::UnknownAudioSystem(id.clone(), system_id.clone())
                        })?;
                        if descriptor.loop_audio.is_none() {
                            descriptor.loop_audio = system.loop_audio;
                        }
                        if descriptor.hint.is_none() {
                            descriptor.hint = system.hint.clone();
                        }
                    }
                }
                AssetType::Text | AssetType::Script => {}
            }

            log::trace!("normalized asset descriptor {} ({})", id, asset_type);
            descriptors.insert(id.clone(), descriptor);
        }

        Ok(AssetConfiguration { descriptors })
    }

    pub fn get(
        &self,
        id: &AssetId,
    ) -> Option<&AssetDescriptor> {
        self.descriptors.get(id)
    }

    /// Whether `id` was statically declared in the manifest. Statically
    /// declared assets are the ones whose abandoned loads are fatal.
    pub fn contains(
        &self,
        id: &AssetId,
    ) -> bool {
        self.descriptors.contains_key(id)
    }

    /// Ids flagged `global`, sorted so the load order is deterministic.
    pub fn global_asset_ids(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self
            .descriptors
            .iter()
            .filter(|(_, descriptor)| descriptor.global)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
