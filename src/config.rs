use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::sentiment::{self, Lexicon, SentimentPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "judgetutor.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Tunables for the text-sentiment part of the overall score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_positive_words")]
    pub positive_words: Vec<String>,

    #[serde(default = "default_negative_words")]
    pub negative_words: Vec<String>,

    #[serde(default = "default_clamp_bound")]
    pub clamp_bound: f64,

    #[serde(default = "default_divisor")]
    pub divisor: f64,

    #[serde(default = "default_bonus_weight")]
    pub bonus_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            positive_words: default_positive_words(),
            negative_words: default_negative_words(),
            clamp_bound: default_clamp_bound(),
            divisor: default_divisor(),
            bonus_weight: default_bonus_weight(),
        }
    }
}

fn default_positive_words() -> Vec<String> {
    sentiment::POSITIVE_WORDS.iter().map(|w| w.to_string()).collect()
}

fn default_negative_words() -> Vec<String> {
    sentiment::NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect()
}

fn default_clamp_bound() -> f64 {
    sentiment::CLAMP_BOUND
}

fn default_divisor() -> f64 {
    sentiment::DIVISOR
}

fn default_bonus_weight() -> f64 {
    sentiment::BONUS_WEIGHT
}

impl ScoringConfig {
    pub fn policy(&self) -> SentimentPolicy {
        SentimentPolicy {
            lexicon: Lexicon::new(&self.positive_words, &self.negative_words),
            clamp_bound: self.clamp_bound,
            divisor: self.divisor,
            bonus_weight: self.bonus_weight,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("invalid configuration")?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Self::from_toml(&content).with_context(|| format!("in {}", path.display()))
    }

    fn check(&self) -> anyhow::Result<()> {
        let scoring = &self.scoring;
        anyhow::ensure!(
            self.database.max_connections > 0,
            "database.max_connections must be at least 1"
        );
        anyhow::ensure!(
            scoring.clamp_bound.is_finite() && scoring.clamp_bound >= 0.0,
            "scoring.clamp_bound must be a non-negative number"
        );
        anyhow::ensure!(
            scoring.divisor.is_finite() && scoring.divisor > 0.0,
            "scoring.divisor must be positive"
        );
        anyhow::ensure!(
            scoring.bonus_weight.is_finite(),
            "scoring.bonus_weight must be a finite number"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_built_in_policy() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.scoring.policy(), SentimentPolicy::default());
    }

    #[test]
    fn partial_scoring_section_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [scoring]
            positive_words = ["patient", "Inspiring"]
            bonus_weight = 0.5
            "#,
        )
        .unwrap();

        let policy = config.scoring.policy();
        assert_eq!(policy.lexicon.positive, vec!["patient", "inspiring"]);
        assert_eq!(policy.lexicon.negative, Lexicon::default().negative);
        assert_eq!(policy.bonus_weight, 0.5);
        assert_eq!(policy.clamp_bound, 3.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_toml("[scoring]\ndivisor = 0.0").is_err());
        assert!(Config::from_toml("[database]\nmax_connections = 0").is_err());
        assert!(Config::from_toml("[scoring]\nclamp_bound = \"three\"").is_err());
    }
}
