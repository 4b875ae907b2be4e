//! Prompt config (config.json) next to a function's skprompt.txt.
//!
//! Carries the completion settings sent with the request and the declared input parameters
//! (with defaults used when the caller does not bind a variable). Unknown fields are ignored so
//! configs written for richer runtimes still load.

use serde::Deserialize;

use super::template::Variables;

/// Root structure of a function's config.json.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_schema")]
    pub schema: u32,
    /// Function kind; only "completion" is executed.
    #[serde(rename = "type", default = "default_type")]
    pub typ: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completion: CompletionSettings,
    #[serde(default)]
    pub input: InputConfig,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            typ: default_type(),
            description: String::new(),
            completion: CompletionSettings::default(),
            input: InputConfig::default(),
        }
    }
}

fn default_schema() -> u32 {
    1
}

fn default_type() -> String {
    "completion".to_string()
}

/// Sampling settings. Unset fields are left to the service's defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionSettings {
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub parameters: Vec<InputParameter>,
}

/// One declared template variable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: String,
}

impl PromptConfig {
    /// Declared parameter defaults, keyed by parameter name.
    pub fn parameter_defaults(&self) -> Variables {
        self.input
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect()
    }
}
