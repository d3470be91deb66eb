//! `schem.toml` settings.
//!
//! ```toml
//! [library]
//! symbol_dirs = ["./symbols"]
//! use_default_dirs = false
//!
//! [connectivity]
//! tolerance = 0.5
//! proximity_radius = 10.0
//!
//! [templates]
//! default_library = "Device"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use schem_eda::SearchConfig;
use serde::{Deserialize, Serialize};

use crate::TEMPLATE_PREFIX;
use crate::netlist::ConnectivityOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: SearchConfig,
    pub connectivity: ConnectivityConfig,
    pub templates: TemplateConfig,
}

/// Tolerances used when matching points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Two points coincide when both axis deltas are below this.
    pub tolerance: f64,
    /// Distance from an instance origin to a net point that counts as a
    /// connection when the instance's pin geometry is unknown.
    pub proximity_radius: f64,
    /// Extend a net through wires that touch wires already on it.
    pub follow_wire_chains: bool,
    /// Treat `_TEMPLATE*` instances as ordinary components.
    pub include_templates: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            proximity_radius: 10.0,
            follow_wire_chains: false,
            include_templates: false,
        }
    }
}

/// Where injected template instances are parked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub prefix: String,
    pub origin: (f64, f64),
    /// Vertical distance between consecutive templates.
    pub spacing: f64,
    pub default_library: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            prefix: TEMPLATE_PREFIX.to_string(),
            origin: (-100.0, -100.0),
            spacing: 10.0,
            default_library: "Device".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse schem.toml: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make connectivity or template placement
    /// meaningless.
    pub fn validate(&self) -> Result<()> {
        ConnectivityOptions::from(self)
            .validate()
            .context("invalid [connectivity] settings")?;
        anyhow::ensure!(
            !self.templates.prefix.is_empty(),
            "[templates] prefix must not be empty"
        );
        let (x, y) = self.templates.origin;
        anyhow::ensure!(
            x.is_finite() && y.is_finite() && self.templates.spacing.is_finite(),
            "[templates] origin and spacing must be finite"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.connectivity.tolerance, 0.5);
        assert_eq!(config.connectivity.proximity_radius, 10.0);
        assert_eq!(config.templates.origin, (-100.0, -100.0));
        assert!(config.library.use_environment);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [library]
            symbol_dirs = ["/opt/symbols"]
            use_default_dirs = false

            [connectivity]
            tolerance = 0.1
            follow_wire_chains = true
            "#,
        )
        .unwrap();
        assert_eq!(config.library.symbol_dirs, vec![PathBuf::from("/opt/symbols")]);
        assert!(!config.library.use_default_dirs);
        assert_eq!(config.library.cache_capacity, 16);
        assert_eq!(config.connectivity.tolerance, 0.1);
        assert_eq!(config.connectivity.proximity_radius, 10.0);
        assert!(config.connectivity.follow_wire_chains);
        assert_eq!(config.templates.default_library, "Device");
    }

    #[test]
    fn bad_types_are_rejected() {
        assert!(Config::from_toml_str("[connectivity]\ntolerance = \"wide\"").is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let err = Config::load(Path::new("/no/such/schem.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/schem.toml"));
    }

    #[test]
    fn unusable_values_are_rejected() {
        for bad in [
            "[connectivity]\ntolerance = 0.0",
            "[connectivity]\ntolerance = -0.5",
            "[connectivity]\ntolerance = inf",
            "[connectivity]\nproximity_radius = -1.0",
            "[templates]\nprefix = \"\"",
            "[templates]\nspacing = nan",
        ] {
            assert!(Config::from_toml_str(bad).is_err(), "accepted {bad:?}");
        }
        let err = Config::from_toml_str("[connectivity]\ntolerance = 0.0").unwrap_err();
        assert!(format!("{err:#}").contains("tolerance"));
    }
}
