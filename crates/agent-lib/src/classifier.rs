//! Namespace environment classification
//!
//! Labels win over names: once a configured label key carries a value, the
//! result is decided by that value alone (an unrecognized value yields
//! [`Environment::Unknown`]). Only unlabeled namespaces fall through to the
//! name heuristics.

use crate::models::Environment;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_ENVIRONMENT_LABEL: &str = "clustercost.io/environment";
pub const DEFAULT_PRODUCTION_NEEDLE: &str = "prod";

/// Inputs for namespace classification
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub label_keys: Vec<String>,
    pub production_label_values: Vec<String>,
    pub nonprod_label_values: Vec<String>,
    pub system_label_values: Vec<String>,
    pub production_name_contains: Vec<String>,
    pub system_namespaces: Vec<String>,
}

/// Deterministic namespace → environment rules
#[derive(Debug, Clone)]
pub struct EnvironmentClassifier {
    label_keys: Vec<String>,
    label_values: HashMap<String, Environment>,
    production_needles: Vec<String>,
    system_namespaces: HashSet<String>,
}

impl EnvironmentClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let label_keys = if config.label_keys.is_empty() {
            vec![DEFAULT_ENVIRONMENT_LABEL.to_string()]
        } else {
            config.label_keys.clone()
        };

        let mut label_values = HashMap::new();
        let groups = [
            (&config.production_label_values, Environment::Production),
            (&config.nonprod_label_values, Environment::Nonprod),
            (&config.system_label_values, Environment::System),
        ];
        for (values, env) in groups {
            for value in values {
                label_values.insert(value.to_lowercase(), env);
            }
        }

        let mut production_needles: Vec<String> = config
            .production_name_contains
            .iter()
            .map(|n| n.to_lowercase())
            .collect();
        if production_needles.is_empty() {
            production_needles.push(DEFAULT_PRODUCTION_NEEDLE.to_string());
        }

        let system_namespaces = config
            .system_namespaces
            .iter()
            .map(|ns| ns.to_lowercase())
            .collect();

        Self {
            label_keys,
            label_values,
            production_needles,
            system_namespaces,
        }
    }

    /// Classify a namespace by its name and labels
    pub fn classify(&self, name: &str, labels: Option<&BTreeMap<String, String>>) -> Environment {
        if let Some(labels) = labels {
            for key in self.label_keys.iter().filter(|k| !k.is_empty()) {
                match labels.get(key) {
                    Some(value) if !value.is_empty() => {
                        return self
                            .label_values
                            .get(&value.to_lowercase())
                            .copied()
                            .unwrap_or(Environment::Unknown);
                    }
                    _ => {}
                }
            }
        }

        let lower_name = name.to_lowercase();
        if self
            .production_needles
            .iter()
            .any(|needle| !needle.is_empty() && lower_name.contains(needle.as_str()))
        {
            return Environment::Production;
        }
        if self.system_namespaces.contains(&lower_name) {
            return Environment::System;
        }
        Environment::Nonprod
    }
}

impl Default for EnvironmentClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}
