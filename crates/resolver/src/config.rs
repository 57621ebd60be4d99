//! Resolver configuration
//!
//! Layered figment loading: compiled defaults, then an optional TOML file,
//! then `RESOLVER_*` environment variables (double underscore for nested
//! fields, e.g. `RESOLVER_DATABASE__URL`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::codec::DEFAULT_MAGIC;
use crate::error::ResolverError;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "resolver.toml";

/// Environment variable prefix.
const ENV_PREFIX: &str = "RESOLVER_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub database: DatabaseConfig,
    pub codec: CodecConfig,
    pub index: IndexConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:resolver.db`.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Derivation-scheme tag prepended to the identifier bytes.
    pub magic: [u8; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Shard tables are named `{table_prefix}_{shard}`.
    pub table_prefix: String,
    /// Length of the stored search key (fingerprint characters after the
    /// shard key). Must stay below the fingerprint length.
    pub search_key_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Identifier corresponding to sequence index 0. Rows store sequence
    /// indices; the offset is applied at read time.
    pub sequence_offset: u64,
    /// Rows buffered in the worker before a per-shard flush.
    pub insert_batch_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:resolver.db".to_string(),
                max_connections: 5,
            },
            codec: CodecConfig {
                magic: DEFAULT_MAGIC,
            },
            index: IndexConfig {
                table_prefix: "guid_reverse".to_string(),
                search_key_len: 10,
            },
            generator: GeneratorConfig {
                // Base of the 64-bit account identifier space this index
                // is generated over.
                sequence_offset: 76561197960265728,
                insert_batch_size: 10_000,
            },
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from the default file location (if present) and
    /// environment overrides.
    pub fn load() -> Result<Self, ResolverError> {
        Self::load_with(None)
    }

    /// Loads configuration from a specific file, which must exist.
    pub fn load_from_file(path: &Path) -> Result<Self, ResolverError> {
        if !path.exists() {
            return Err(ResolverError::configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Self::load_with(Some(path))
    }

    fn load_with(path: Option<&Path>) -> Result<Self, ResolverError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                debug!(path = %path.display(), "loading configuration file");
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    debug!(path = DEFAULT_CONFIG_FILE, "loading configuration file");
                    figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
                }
            }
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|err| ResolverError::configuration(err.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.database.url.is_empty() {
            return Err(ResolverError::configuration("database.url must be set"));
        }
        if self.database.max_connections == 0 {
            return Err(ResolverError::configuration(
                "database.max_connections must be at least 1",
            ));
        }
        // Interpolated into table names; restrict to identifier characters.
        if self.index.table_prefix.is_empty()
            || !self
                .index
                .table_prefix
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(ResolverError::configuration(
                "index.table_prefix must be a non-empty SQL identifier",
            ));
        }
        if self.index.search_key_len == 0 || self.index.search_key_len > 31 {
            return Err(ResolverError::configuration(
                "index.search_key_len must be between 1 and 31",
            ));
        }
        // The high-water mark of an empty index is sequence_offset - 1.
        if self.generator.sequence_offset == 0 {
            return Err(ResolverError::configuration(
                "generator.sequence_offset must be at least 1",
            ));
        }
        if self.generator.insert_batch_size == 0 {
            return Err(ResolverError::configuration(
                "generator.insert_batch_size must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.codec.magic, [0x42, 0x45]);
        assert_eq!(config.index.search_key_len, 10);
    }

    #[test]
    fn zero_offset_is_rejected() {
        let mut config = ResolverConfig::default();
        config.generator.sequence_offset = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn search_key_len_bounds() {
        let mut config = ResolverConfig::default();
        config.index.search_key_len = 0;
        assert!(config.validate().is_err());
        config.index.search_key_len = 32;
        assert!(config.validate().is_err());
        config.index.search_key_len = 31;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn table_prefix_must_be_identifier() {
        let mut config = ResolverConfig::default();
        config.index.table_prefix = "bad prefix; drop".to_string();
        assert!(config.validate().is_err());
        config.index.table_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = ResolverConfig::load_from_file(Path::new("/non/existent/resolver.toml"));
        assert!(matches!(
            result,
            Err(ResolverError::Configuration { .. })
        ));
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = ResolverConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: ResolverConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(parsed.generator.sequence_offset, config.generator.sequence_offset);
    }
}
