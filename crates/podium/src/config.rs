//! TOML description of a leaderboard matrix.
//!
//! ```toml
//! [[dimensions]]
//! name = "global"
//!
//! [[dimensions]]
//! name = "weekly"
//! cycle = "week"
//!
//! [[features]]
//! name = "kills"
//! sort-policy = "high-to-low"
//! update-policy = "aggregate"
//!
//! [[features]]
//! name = "best-lap"
//! sort-policy = "low-to-high"
//! update-policy = "best"
//! limit-top-n = 100
//! ```
//!
//! Only built-in cycles can be named here. Dimensions that rotate on a
//! custom function are built in code with [`DimensionDef::periodic`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::{check_names, DimensionDef, FeatureDef};
use crate::periodic::CycleKind;
use crate::policy::LeaderboardOptions;

/// A matrix layout: its dimensions and features, in declared order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MatrixConfig {
    pub dimensions: Vec<DimensionConfig>,
    pub features: Vec<FeatureConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DimensionConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureConfig {
    pub name: String,
    #[serde(flatten)]
    pub options: LeaderboardOptions,
}

impl MatrixConfig {
    /// Parses a TOML document. Duplicate dimension or feature names are
    /// rejected.
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: MatrixConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&input)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        check_names("dimension", self.dimensions.iter().map(|d| d.name.as_str()))?;
        check_names("feature", self.features.iter().map(|f| f.name.as_str()))
    }

    pub(crate) fn dimension_defs(&self) -> Vec<DimensionDef> {
        self.dimensions
            .iter()
            .map(|d| match d.cycle {
                Some(kind) => DimensionDef::periodic(d.name.clone(), kind),
                None => DimensionDef::new(d.name.clone()),
            })
            .collect()
    }

    pub(crate) fn feature_defs(&self) -> Vec<FeatureDef> {
        self.features
            .iter()
            .map(|f| FeatureDef::new(f.name.clone(), f.options))
            .collect()
    }
}
