//! Player discovery and playback error types

mod error;
pub mod locator;

pub use error::PlaybackError;
pub use locator::{
    resolve, resolve_with_search_path, ArgStyle, FixedLocator, Platform, PlaybackOptions, PlayerLocator,
    PlayerRecipe, SystemLocator,
};
