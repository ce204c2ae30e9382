use crate::config::ResearchConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/Research.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default TOML file and `NT_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load() -> Result<ResearchConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by layering built-in defaults, the given TOML file
    /// and `NT_`-prefixed environment variables (`NT_DATA__HISTORY_PATH`).
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the environment contains invalid values.
    pub fn load_from(path: impl AsRef<Path>) -> Result<ResearchConfig> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
        }

        let config: ResearchConfig = Figment::from(Serialized::defaults(ResearchConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("NT_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ConfigLoader::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.data.history_path, "data/history.parquet");
        assert_eq!(config.charts.width, 1200);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Research.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[data]\nhistory_path = \"snap.parquet\"\n\n[output]\nformat = \"html\""
        )
        .unwrap();

        let config = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(config.data.history_path, "snap.parquet");
        assert_eq!(config.output.format, "html");
        // untouched sections keep their defaults
        assert_eq!(config.output.results_dir, "results");
        assert_eq!(config.data.timezone, "America/Denver");
    }
}
