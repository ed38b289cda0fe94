//! Configuration management for prompt sessions

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{ConfigLoader, ConfigSource, FileConfig};
pub use schema::{CommonConfig, Config, PromptConfig};
pub use validator::ConfigValidator;
