//! The scene stack and its deferred scene-change queue.
//!
//! Scene transitions never mutate the stack at the call site: `push`,
//! `replace` and `pop` enqueue tagged requests that [`Game::tick`] flushes at
//! one defined point per simulation step, re-draining anything the flush
//! itself enqueued. Incoming scenes load their declared asset group and their
//! storage keys concurrently; the scene's `ready`/`loaded` milestones fire
//! exactly once, after both have settled, in whichever order they finish.

mod game;
mod scene;
mod storage;

pub use game::Game;
pub use game::SceneChangeRequest;

pub use scene::Scene;
pub use scene::SceneId;
pub use scene::SceneParameters;
pub use scene::SceneState;

pub use storage::MemoryStorageBackend;
pub use storage::StorageBackend;
pub use storage::StorageEvent;
pub use storage::StorageKey;
pub use storage::StorageLoadState;
pub use storage::StorageLoader;
pub use storage::StorageReadCompletion;
pub use storage::StorageValue;

#[cfg(test)]
pub(crate) mod test_support;
