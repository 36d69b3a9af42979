//! Configuration loading

pub mod loader;

pub use loader::{find_config_path, load, load_from_env, load_from_file};
