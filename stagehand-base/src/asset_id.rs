use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Identity of an asset as declared in the game manifest (or ad hoc for
/// dynamically declared assets). Ids are plain strings; the newtype keeps
/// clones cheap since ids end up as keys in several tables at once.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct AssetId(Arc<str>);

impl AssetId {
    pub fn new(id: &str) -> Self {
        AssetId(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        AssetId::new(id)
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        AssetId(Arc::from(id.as_str()))
    }
}

impl Debug for AssetId {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("AssetId").field(&self.0).finish()
    }
}

impl fmt::Display for AssetId {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AssetId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AssetId::from(s))
    }
}

/// The kind of concrete resource an asset resolves to. The loader calls the
/// matching `ResourceFactory` constructor exactly once per new asset.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Audio,
    Text,
    Script,
    Video,
}

impl fmt::Display for AssetType {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            AssetType::Image => "image",
            AssetType::Audio => "audio",
            AssetType::Text => "text",
            AssetType::Script => "script",
            AssetType::Video => "video",
        };
        f.write_str(name)
    }
}
