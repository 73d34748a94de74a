//! CLI settings: an optional TOML file, then environment overrides.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use lingoforge_generation::HttpGeneratorConfig;
use lingoforge_pipeline::PipelineConfig;

pub const ENV_GENERATOR_ENDPOINT: &str = "LINGOFORGE_GENERATOR_ENDPOINT";
pub const ENV_GENERATOR_MODEL: &str = "LINGOFORGE_GENERATOR_MODEL";
pub const ENV_GENERATOR_API_KEY: &str = "LINGOFORGE_GENERATOR_API_KEY";

/// Everything a command needs besides the state snapshot.
///
/// ```toml
/// [pipeline]
/// max_retries = 3
/// generation_timeout_secs = 90
///
/// [generator]
/// endpoint = "https://api.openai.com/v1"
/// model = "gpt-4o-mini"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub generator: HttpGeneratorConfig,
}

impl Settings {
    /// Load from `path` (if given) and apply the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&contents)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.with_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.pipeline = self.pipeline.with_overrides(&lookup)?;

        if let Some(endpoint) = lookup(ENV_GENERATOR_ENDPOINT) {
            self.generator.endpoint = endpoint;
        }
        if let Some(model) = lookup(ENV_GENERATOR_MODEL) {
            self.generator.model = model;
        }
        if let Some(key) = lookup(ENV_GENERATOR_API_KEY) {
            self.generator.api_key = Some(key);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    const SAMPLE: &str = r#"
[pipeline]
max_retries = 5
generation_timeout_secs = 30
job_spacing_secs = 3600

[generator]
endpoint = "https://llm.example.com/v1"
model = "tiny"
api_key = "from-file"
"#;

    #[test]
    fn parses_toml_and_keeps_defaults() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.pipeline.max_retries, 5);
        assert_eq!(settings.pipeline.generation_timeout, Duration::from_secs(30));
        assert_eq!(settings.pipeline.job_spacing, Duration::from_secs(3600));
        assert_eq!(settings.pipeline.staleness_window, Duration::from_secs(120));
        assert_eq!(settings.generator.model, "tiny");
        assert_eq!(settings.generator.temperature, 0.7);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn environment_wins_over_file() {
        let env = HashMap::from([
            (ENV_GENERATOR_API_KEY, "from-env"),
            ("LINGOFORGE_MAX_RETRIES", "2"),
        ]);
        let settings = Settings::from_toml(SAMPLE)
            .unwrap()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.generator.api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.generator.endpoint, "https://llm.example.com/v1");
        assert_eq!(settings.pipeline.max_retries, 2);
    }

    #[test]
    fn unknown_duration_type_is_an_error() {
        assert!(Settings::from_toml("[pipeline]\ngeneration_timeout_secs = \"soon\"").is_err());
    }
}
