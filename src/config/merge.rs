//! Merge rules: defaults, override order, conflict handling.

use crate::serve::DEFAULT_PREFIX;
use crate::store::{DEFAULT_STORE_NAME, SCHEMA_VERSION};
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key, so a file that sets only
/// `serve.listen` keeps every other default.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.store_name", DEFAULT_STORE_NAME)?
        .set_default("storage.version", SCHEMA_VERSION as i64)?
        .set_default("serve.prefix", DEFAULT_PREFIX)?
        .set_default("serve.listen", DEFAULT_LISTEN)
}
