//! The reference-counted loading cache.
//!
//! Assets move through three mutually exclusive states that are each cheap to
//! check: present in the resolved cache, present in the loading table, or
//! unknown. Requesting the same id from N consumers before it resolves costs
//! exactly one factory call and N waiter notifications, each bumping one
//! shared reference count. The moment the count returns to zero the entry is
//! purged from every table and the underlying resource is released.
//!
//! All "asynchronous" completion flows through a single crossbeam channel
//! drained by [`AssetManager::update`]; concrete resources report back through
//! the [`LoadCompletion`] they were handed when the load was issued.

mod asset_holder;
mod asset_manager;
mod resource;

pub use asset_holder::AssetHolder;
pub use asset_holder::HolderEvent;
pub use asset_holder::HolderNotifier;

pub use asset_manager::AssetLoadHandler;
pub use asset_manager::AssetManager;
pub use asset_manager::AssetRequest;
pub use asset_manager::ErrorDisposition;
pub use asset_manager::SharedLoadHandler;

pub use resource::LoadCompletion;
pub use resource::LoadResult;
pub use resource::LoaderEvent;
pub use resource::Resource;
pub use resource::ResourceCell;
pub use resource::ResourceFactory;

#[cfg(test)]
pub(crate) mod test_support;
