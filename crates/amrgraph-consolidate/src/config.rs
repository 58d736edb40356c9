use amrgraph_dsl::ParseOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a consolidation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Options passed to the AMR parser for every sentence.
    pub parse: ParseOptions,
    /// Longest token span considered as a mention.
    pub max_mention_tokens: usize,
    /// Parse sentences and collect mentions on the rayon pool.
    pub parallel: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            max_mention_tokens: 4,
            parallel: true,
        }
    }
}

impl ConsolidationConfig {
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid consolidation config")?;
        if config.max_mention_tokens == 0 {
            anyhow::bail!("max_mention_tokens must be at least 1");
        }
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ConsolidationConfig::from_json_str(r#"{ "parse": { "preserve_inverse": true } }"#).unwrap();
        assert!(config.parse.preserve_inverse);
        assert!(config.parse.memoize);
        assert_eq!(config.max_mention_tokens, 4);
    }

    #[test]
    fn zero_mention_length_is_rejected() {
        assert!(ConsolidationConfig::from_json_str(r#"{ "max_mention_tokens": 0 }"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("consolidate.json");
        std::fs::write(&path, r#"{ "max_mention_tokens": 2, "parallel": false }"#).unwrap();

        let config = ConsolidationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_mention_tokens, 2);
        assert!(!config.parallel);
        assert_eq!(config.parse, ParseOptions::default());
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let error = ConsolidationConfig::from_json_file(&path).unwrap_err();
        assert!(format!("{error:#}").contains("absent.json"));
    }
}
