//! Configuration loaded from `.kvfetch.toml`.

pub mod settings;

pub use settings::Settings;
