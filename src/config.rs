//! Suite configuration
//!
//! Settings come from the environment (`MOZSUITE_*`) and can be overridden
//! by the CLI. The timeout and locale settings are carried for the host
//! driver and the engine; the harness itself does not enforce them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Corpus root directory
pub const ENV_TESTS: &str = "MOZSUITE_TESTS";
/// Override manifest location
pub const ENV_MANIFEST: &str = "MOZSUITE_MANIFEST";
/// Run tests marked `slow`
pub const ENV_RUNSLOW: &str = "MOZSUITE_RUNSLOW";
/// Per-run timeout in milliseconds
pub const ENV_TIMEOUT: &str = "MOZSUITE_TIMEOUT";
pub const ENV_LOCALE: &str = "MOZSUITE_LOCALE";
pub const ENV_TIMEZONE: &str = "MOZSUITE_TIMEZONE";

/// Default location of the harness' own override manifest
pub const DEFAULT_MANIFEST: &str = "testsrc/jstests.list";

/// Configuration for a suite run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteConfig {
    /// Root of the jstests corpus
    pub tests_root: Option<PathBuf>,
    /// Override manifest; ignored when the file does not exist
    pub manifest: PathBuf,
    /// Whether tests marked `slow` run
    pub run_slow: bool,
    /// Maximum time per run, enforced by the host driver
    pub timeout: Duration,
    pub locale: String,
    pub timezone: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            tests_root: None,
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            run_slow: false,
            timeout: Duration::from_secs(10),
            locale: "en-US".to_string(),
            timezone: "America/Los_Angeles".to_string(),
        }
    }
}

impl SuiteConfig {
    /// Read the configuration from `MOZSUITE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_TESTS) {
            config.tests_root = Some(PathBuf::from(root));
        }
        if let Some(manifest) = lookup(ENV_MANIFEST) {
            config.manifest = PathBuf::from(manifest);
        }
        if let Some(flag) = lookup(ENV_RUNSLOW) {
            config.run_slow = parse_bool(&flag);
        }
        if let Some(ms) = lookup(ENV_TIMEOUT) {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                Error::config(format!("{} must be a number of milliseconds, got '{}'", ENV_TIMEOUT, ms))
            })?;
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(locale) = lookup(ENV_LOCALE) {
            config.locale = locale;
        }
        if let Some(tz) = lookup(ENV_TIMEZONE) {
            config.timezone = tz;
        }
        Ok(config)
    }

    /// The corpus root, checked to be an existing directory
    pub fn validate(&self) -> Result<&Path> {
        let root = self.tests_root.as_deref().ok_or_else(|| {
            Error::config(format!("missing corpus location, set {}", ENV_TESTS))
        })?;
        if !root.is_dir() {
            return Err(Error::config(format!(
                "corpus directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(root)
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SuiteConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SuiteConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.manifest, PathBuf::from("testsrc/jstests.list"));
        assert!(!config.run_slow);
    }

    #[test]
    fn test_env_values() {
        let config = SuiteConfig::from_lookup(lookup(&[
            (ENV_TESTS, "/moz/js/src/tests"),
            (ENV_RUNSLOW, "TRUE"),
            (ENV_TIMEOUT, "2500"),
            (ENV_TIMEZONE, "UTC"),
        ]))
        .unwrap();
        assert_eq!(config.tests_root, Some(PathBuf::from("/moz/js/src/tests")));
        assert!(config.run_slow);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn test_runslow_only_true_enables() {
        let config = SuiteConfig::from_lookup(lookup(&[(ENV_RUNSLOW, "yes")])).unwrap();
        assert!(!config.run_slow);
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let err = SuiteConfig::from_lookup(lookup(&[(ENV_TIMEOUT, "10s")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_root() {
        let config = SuiteConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let dir = tempfile::tempdir().unwrap();
        let config = SuiteConfig {
            tests_root: Some(dir.path().join("missing")),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SuiteConfig {
            tests_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap(), dir.path());
    }
}
