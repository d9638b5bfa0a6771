//! Pipeline configuration
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ability::AbilityRules;
use crate::error::{RouteError, RouteResult};
use crate::estimate::EstimatorConfig;

/// Which abilities take part in logic-tile identities.
///
/// Either a preset name (`"all"`, `"graph_default"`) or an explicit list of
/// ability names in the order they are evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbilitySelection {
    Preset(String),
    List(Vec<String>),
}

impl Default for AbilitySelection {
    fn default() -> Self {
        Self::Preset("graph_default".to_string())
    }
}

impl AbilitySelection {
    /// Parse a command-line value: a preset or a comma-separated list.
    #[must_use]
    pub fn parse_arg(value: &str) -> Self {
        let trimmed = value.trim();
        if matches!(trimmed, "all" | "graph_default") {
            return Self::Preset(trimmed.to_string());
        }
        Self::List(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// # Errors
    ///
    /// Returns [`RouteError::InvalidConfig`] for an unknown preset and
    /// [`RouteError::UnknownAbility`] for an unknown ability name.
    pub fn rules(&self) -> RouteResult<AbilityRules> {
        match self {
            Self::Preset(name) if name == "all" => Ok(AbilityRules::all()),
            Self::Preset(name) if name == "graph_default" => Ok(AbilityRules::graph_default()),
            Self::Preset(name) => Err(RouteError::InvalidConfig {
                field: "abilities",
                reason: format!("unknown preset {name:?}, expected \"all\" or \"graph_default\""),
            }),
            Self::List(names) => AbilityRules::from_names(names),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub abilities: AbilitySelection,
    /// Fields keying the best-time estimator; `None` uses every route,
    /// event and ability field.
    #[serde(default)]
    pub estimator_fields: Option<Vec<String>>,
    /// Glob patterns for run files, relative to the data directory.
    #[serde(default = "default_runs")]
    pub runs: Vec<String>,
    /// Directory holding the reference tables.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            abilities: AbilitySelection::default(),
            estimator_fields: None,
            runs: default_runs(),
            data_dir: None,
        }
    }
}

fn default_runs() -> Vec<String> {
    vec!["**/*.csv".to_string()]
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the configuration does
    /// not validate.
    pub fn from_json(name: &str, json: &str) -> RouteResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|source| RouteError::Json {
            path: name.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration.
    pub fn load(path: &Path) -> RouteResult<Self> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| RouteError::Io {
            path: display.clone(),
            source,
        })?;
        log::debug!("loading configuration from {display}");
        Self::from_json(&display, &raw)
    }

    /// # Errors
    ///
    /// Returns the first problem found in the configuration.
    pub fn validate(&self) -> RouteResult<()> {
        self.ability_rules()?;
        self.estimator_config()?;
        if self.runs.iter().all(|p| p.trim().is_empty()) {
            return Err(RouteError::InvalidConfig {
                field: "runs",
                reason: "at least one run pattern is required".to_string(),
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// See [`AbilitySelection::rules`].
    pub fn ability_rules(&self) -> RouteResult<AbilityRules> {
        self.abilities.rules()
    }

    /// # Errors
    ///
    /// Returns an error for an empty or unknown field list.
    pub fn estimator_config(&self) -> RouteResult<EstimatorConfig> {
        self.estimator_fields
            .as_deref()
            .map_or_else(|| Ok(EstimatorConfig::default()), EstimatorConfig::from_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::Ability;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_json("cfg.json", "{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.ability_rules().unwrap(), AbilityRules::graph_default());
        assert_eq!(config.estimator_config().unwrap(), EstimatorConfig::default());
    }

    #[test]
    fn explicit_ability_list_keeps_order() {
        let config = PipelineConfig::from_json(
            "cfg.json",
            r#"{ "abilities": ["can_swim", "dash"], "runs": ["runs/*.csv"] }"#,
        )
        .unwrap();
        assert_eq!(
            config.ability_rules().unwrap().abilities(),
            &[Ability::Swim, Ability::Dash]
        );
        assert_eq!(config.runs, vec!["runs/*.csv"]);
    }

    #[test]
    fn rejects_bad_values() {
        let err = PipelineConfig::from_json("cfg.json", r#"{ "abilities": "most" }"#).unwrap_err();
        assert!(matches!(err, RouteError::InvalidConfig { field: "abilities", .. }));
        let err = PipelineConfig::from_json("cfg.json", r#"{ "abilities": ["can_fly"] }"#).unwrap_err();
        assert!(matches!(err, RouteError::UnknownAbility(_)));
        let err = PipelineConfig::from_json("cfg.json", r#"{ "estimator_fields": [] }"#).unwrap_err();
        assert!(matches!(err, RouteError::InvalidConfig { field: "estimator_fields", .. }));
        let err = PipelineConfig::from_json("cfg.json", r#"{ "runs": [""] }"#).unwrap_err();
        assert!(matches!(err, RouteError::InvalidConfig { field: "runs", .. }));
        assert!(PipelineConfig::from_json("cfg.json", "{").is_err());
    }

    #[test]
    fn command_line_selection() {
        assert_eq!(
            AbilitySelection::parse_arg("all"),
            AbilitySelection::Preset("all".to_string())
        );
        assert_eq!(
            AbilitySelection::parse_arg("dash, swim"),
            AbilitySelection::List(vec!["dash".to_string(), "swim".to_string()])
        );
    }
}
