//! Pipeline configuration.
//!
//! Every tunable the pipeline exposes lives here: quality thresholds, the
//! date-clamping policy, and worker-pool sizing. Values come from an
//! optional JSON file named by `DEALFORGE_CONFIG`; anything not specified
//! falls back to the defaults below. Thresholds are configuration, not
//! hard-coded business law.

use serde::Deserialize;
use std::{env, fs::File, path::Path, time::Duration};

use crate::prelude::*;

/// Thresholds used by the quality scorer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Minimum score for a deal to be considered promotable.
    pub min_promotion_score: f64,
    /// Scores below this are rejected without human review.
    pub auto_reject_score: f64,
    /// Minimum discount percentage that earns full credit.
    pub min_discount_percentage: f64,
    /// Minimum original-vs-deal price difference that earns full credit,
    /// in currency units.
    pub min_savings_amount: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            min_promotion_score: 0.40,
            auto_reject_score: 0.25,
            min_discount_percentage: 5.0,
            min_savings_amount: 1.0,
        }
    }
}

/// The date-clamping policy applied to producer-supplied date ranges.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateConfig {
    /// Start dates in years before this are treated as malformed.
    pub min_accepted_year: i32,
    /// How long a deal stays valid when the producer gave no usable end
    /// date.
    #[serde(with = "humantime_serde")]
    pub default_validity_window: Duration,
}

impl Default for DateConfig {
    fn default() -> Self {
        DateConfig {
            min_accepted_year: 2020,
            // 60 days.
            default_validity_window: Duration::from_secs(60 * 24 * 60 * 60),
        }
    }
}

/// Worker-pool and queue sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of worker threads per process.
    pub concurrency: usize,
    /// How long an idle worker sleeps before polling the queue again.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Default delivery attempts before a queue job is declared dead.
    pub max_attempts: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            concurrency: 4,
            poll_interval: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Quality-scorer thresholds.
    pub quality: QualityConfig,
    /// Date-clamping policy.
    pub dates: DateConfig,
    /// Worker-pool sizing.
    pub worker: WorkerConfig,
}

impl Config {
    /// Load configuration from the file named by `DEALFORGE_CONFIG`, or
    /// return the defaults if the variable is unset.
    pub fn load() -> Result<Config> {
        match env::var("DEALFORGE_CONFIG") {
            Ok(path) => Config::from_file(Path::new(&path)),
            Err(_) => Ok(Config::default()),
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Config> {
        let f = File::open(path)
            .with_context(|| format!("can't open config file {}", path.display()))?;
        let config = serde_json::from_reader(f)
            .with_context(|| format!("can't parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[test]
fn default_thresholds_match_pipeline_policy() {
    let config = Config::default();
    assert_eq!(config.quality.min_promotion_score, 0.40);
    assert_eq!(config.quality.auto_reject_score, 0.25);
    assert_eq!(config.dates.min_accepted_year, 2020);
    assert_eq!(
        config.dates.default_validity_window,
        Duration::from_secs(60 * 24 * 60 * 60)
    );
}

#[test]
fn worker_defaults_keep_polling_gentle() {
    // The worker sleeps this long when idle and after claim errors; a
    // zero interval would spin hot against the pool.
    let config = WorkerConfig::default();
    assert!(config.poll_interval >= Duration::from_secs(1));
    assert!(config.concurrency >= 1);
}

#[test]
fn partial_config_files_keep_defaults_elsewhere() {
    let json = r#"{ "quality": { "auto_reject_score": 0.1 }, "worker": { "poll_interval": "1s" } }"#;
    let config: Config = serde_json::from_str(json).expect("parse error");
    assert_eq!(config.quality.auto_reject_score, 0.1);
    assert_eq!(config.quality.min_promotion_score, 0.40);
    assert_eq!(config.worker.poll_interval, Duration::from_secs(1));
    assert_eq!(config.worker.concurrency, 4);
}
