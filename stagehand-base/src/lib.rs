pub mod hashing;

mod asset_id;
mod error;
mod manifest;
mod trigger;

pub use asset_id::AssetId;
pub use asset_id::AssetType;

pub use error::AssetLoadError;
pub use error::AssetLoadErrorKind;
pub use error::ManifestError;
pub use error::StorageError;

pub use manifest::AssetConfiguration;
pub use manifest::AssetDescriptor;
pub use manifest::AudioSystemConfiguration;
pub use manifest::DynamicAssetDescriptor;
pub use manifest::GameManifest;

pub use trigger::HandlerId;
pub use trigger::Trigger;
