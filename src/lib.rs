//! Sproutvale library crate: the cozy farming core and its adapters.
//!
//! The binary crate (`main.rs`) is a headless voice host. This library
//! exposes every module so that `tests/` integration tests and other hosts
//! can build the same app without a window.

pub mod shared;
pub mod config;
pub mod data;
pub mod farming;
pub mod economy;
pub mod homestead;
pub mod save;
pub mod voice;

use bevy::prelude::*;

/// Every domain plugin a host needs. Add `StatesPlugin` (or a plugin group
/// that includes it) first; insert `FarmConfig`, `FarmClock`, and a
/// `FarmRepository` with a store beforehand to override the defaults.
pub struct SproutvalePlugin;

impl Plugin for SproutvalePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<shared::HostState>()
            .init_resource::<config::FarmConfig>()
            .add_plugins(data::DataPlugin)
            .add_plugins(farming::FarmCorePlugin)
            .add_plugins(economy::EconomyPlugin)
            .add_plugins(save::SavePlugin);
    }
}
