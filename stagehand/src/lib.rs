#[cfg(feature = "stagehand-base")]
pub use stagehand_base as base;

#[cfg(feature = "stagehand-loader")]
pub use stagehand_loader as loader;

#[cfg(feature = "stagehand-game")]
pub use stagehand_game as game;
