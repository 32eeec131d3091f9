//! Settings file
//!
//! Optional TOML file passed with `--config`:
//!
//! ```toml
//! volume = "/media/MULTIFLASH"
//! link = "dummy:device=SAMD21G18A"
//! settle_ms = 250
//!
//! [flash]
//! clock_khz = 50
//! erase_before_program = false
//! protect_after = true
//! protect_level = 6
//! ```
//!
//! Command-line flags take precedence over every value here.

use std::fs;
use std::path::{Path, PathBuf};

use multiflash_core::flash::FlashConfig;
use multiflash_core::notify::SETTLE_WINDOW_MS;
use serde::Deserialize;
use thiserror::Error;

/// Errors loading the settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid settings TOML
    #[error("invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// A required value was given neither on the command line nor in the file
    #[error("no {0} given (use --{0} or set it in the config file)")]
    Missing(&'static str),
}

/// Contents of the settings file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory standing in for the mass-storage volume
    pub volume: Option<PathBuf>,
    /// Link spec, `name[:key=value,...]`
    pub link: Option<String>,
    /// Quiescence window after the last change, in milliseconds
    pub settle_ms: Option<u64>,
    /// Orchestrator parameters
    pub flash: FlashConfig,
}

impl Settings {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Volume directory, preferring the command-line value
    pub fn volume(&self, cli: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        cli.or_else(|| self.volume.clone())
            .ok_or(ConfigError::Missing("volume"))
    }

    /// Link spec, preferring the command-line value
    pub fn link(&self, cli: Option<String>) -> Result<String, ConfigError> {
        cli.or_else(|| self.link.clone())
            .ok_or(ConfigError::Missing("link"))
    }

    /// Settle window, preferring the command-line value
    pub fn settle_ms(&self, cli: Option<u64>) -> u64 {
        cli.or(self.settle_ms).unwrap_or(SETTLE_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiflash_core::fuse::BootProt;

    #[test]
    fn test_empty_file_is_default() {
        let s = Settings::from_toml_str("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.flash, FlashConfig::default());
        assert_eq!(s.settle_ms(None), 250);
    }

    #[test]
    fn test_full_file() {
        let s = Settings::from_toml_str(
            r#"
            volume = "/tmp/vol"
            link = "dummy:locked=true"
            settle_ms = 500

            [flash]
            clock_khz = 1000
            erase_before_program = true
            protect_level = 0
            "#,
        )
        .unwrap();

        assert_eq!(s.volume(None).unwrap(), PathBuf::from("/tmp/vol"));
        assert_eq!(s.link(None).unwrap(), "dummy:locked=true");
        assert_eq!(s.settle_ms(None), 500);
        assert_eq!(s.flash.clock_khz, 1000);
        assert!(s.flash.erase_before_program);
        assert!(s.flash.protect_after);
        assert_eq!(s.flash.protect_level, BootProt::WIDEST);
        assert_eq!(s.flash.wait_retry, 128);
    }

    #[test]
    fn test_cli_overrides_file() {
        let s = Settings::from_toml_str("volume = \"/a\"\nsettle_ms = 10\n").unwrap();
        assert_eq!(
            s.volume(Some(PathBuf::from("/b"))).unwrap(),
            PathBuf::from("/b")
        );
        assert_eq!(s.settle_ms(Some(20)), 20);
        assert!(matches!(s.link(None), Err(ConfigError::Missing("link"))));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Settings::from_toml_str("volum = \"/a\"").is_err());
        assert!(Settings::from_toml_str("[flash]\nclock = 5").is_err());
    }

    #[test]
    fn test_protect_level_range() {
        let settings = Settings::from_toml_str("[flash]\nprotect_level = 7").unwrap();
        assert_eq!(settings.flash.protect_level, BootProt::NONE);
        assert!(Settings::from_toml_str("[flash]\nprotect_level = 8").is_err());
        assert!(Settings::from_toml_str("[flash]\nprotect_level = 255").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multiflash.toml");
        std::fs::write(&path, "settle_ms = \"soon\"").unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("multiflash.toml"));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Settings::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
