// ========================================================================================
//
//                     Data sources: where fresher model outputs come from
//
// ========================================================================================
//
// The backend publishes a dashboard snapshot: the national mean outcome, the ranked
// regression coefficients with their p-values, per-cluster profiles and the yearly
// national trend. This module reads that snapshot
// through the `DataSource` trait and folds it into the simulator's inputs.
//
// A source failing is never an error for the caller of `refresh`. The store keeps its
// previous weights, the base falls back to the configured default, and the returned
// `LiveInputs::live` flag is cleared so a front end can show an advisory notice.

use crate::coefficients::CoefficientStore;
use crate::region::{Region, RegionBaselines};
use crate::variable::Variable;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// National mean HCLE used whenever no live value is available.
pub const DEFAULT_BASE_VALUE: f64 = 0.3492;

// ========================================================================================
//                                  Snapshot payload
// ========================================================================================

/// One row of the coefficient ranking as published by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaRow {
    #[serde(rename = "Variabel")]
    pub variable: String,
    #[serde(rename = "Koefisien (Beta)", default)]
    pub coefficient: Option<f64>,
    #[serde(rename = "P-Value", default)]
    pub p_value: Option<f64>,
}

/// Mean outcome of one cluster. The backend sends the mean of every indicator as well;
/// only the outcome is used here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfileRow {
    #[serde(rename = "Kluster")]
    pub cluster: String,
    #[serde(rename = "HCLE", default)]
    pub mean_value: Option<f64>,
}

/// National means for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    #[serde(rename = "Tahun")]
    pub year: i32,
    #[serde(rename = "HCLE")]
    pub mean_value: f64,
    #[serde(rename = "NEET", default)]
    pub neet: Option<f64>,
}

/// National series shown when no source delivers one.
pub const DEFAULT_TREND: [TrendPoint; 4] = [
    TrendPoint {
        year: 2021,
        mean_value: 0.3650,
        neet: Some(21.5),
    },
    TrendPoint {
        year: 2022,
        mean_value: 0.3580,
        neet: Some(21.8),
    },
    TrendPoint {
        year: 2023,
        mean_value: 0.3520,
        neet: Some(22.1),
    },
    TrendPoint {
        year: 2024,
        mean_value: DEFAULT_BASE_VALUE,
        neet: Some(22.4),
    },
];

/// Movement between the last two years of a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendChange {
    pub year: i32,
    pub mean_value: f64,
    /// Change of the mean outcome since the previous year.
    pub mean_delta: f64,
    pub neet: Option<f64>,
    /// Change of the NEET rate in percentage points, when both years report it.
    pub neet_delta: Option<f64>,
}

/// Compares the latest point of a year-ordered series with the one before it.
/// Returns `None` for series shorter than two points.
pub fn latest_change(trend: &[TrendPoint]) -> Option<TrendChange> {
    let [.., previous, latest] = trend else {
        return None;
    };
    Some(TrendChange {
        year: latest.year,
        mean_value: latest.mean_value,
        mean_delta: latest.mean_value - previous.mean_value,
        neet: latest.neet,
        neet_delta: latest.neet.zip(previous.neet).map(|(now, before)| now - before),
    })
}

/// Held-out evaluation of the regression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(rename = "R2")]
    pub r_squared: f64,
    #[serde(rename = "MSE")]
    pub mean_squared_error: f64,
}

/// Everything a source may deliver. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(rename = "mean_hcle_2024", alias = "base_value", default)]
    pub mean_value: Option<f64>,
    #[serde(default)]
    pub beta_ranking: Vec<BetaRow>,
    #[serde(default)]
    pub cluster_profile: Vec<ClusterProfileRow>,
    #[serde(default)]
    pub trend_data: Vec<TrendPoint>,
    #[serde(default)]
    pub metrics: Option<ModelMetrics>,
}

impl DashboardSnapshot {
    /// Coefficients carried by the ranking, keyed by the backend's variable names.
    pub fn coefficients(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.beta_ranking
            .iter()
            .filter_map(|row| row.coefficient.map(|c| (row.variable.as_str(), c)))
    }
}

// ========================================================================================
//                                  Source contract
// ========================================================================================

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read data source '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse dashboard snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse coefficient table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can deliver a dashboard snapshot on demand.
pub trait DataSource {
    fn fetch(&self) -> Result<DashboardSnapshot, SourceError>;

    /// Human-readable origin, used in log messages.
    fn describe(&self) -> String;
}

/// A dashboard snapshot saved as JSON, in the backend's response format.
#[derive(Debug, Clone)]
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for JsonSnapshotSource {
    fn fetch(&self) -> Result<DashboardSnapshot, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }
}

/// A coefficient ranking exported as CSV with `Variabel` and `Koefisien (Beta)`
/// columns. It carries coefficients only; base and cluster values stay at their
/// defaults.
#[derive(Debug, Clone)]
pub struct BetaCsvSource {
    path: PathBuf,
}

impl BetaCsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for BetaCsvSource {
    fn fetch(&self) -> Result<DashboardSnapshot, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));
        let beta_ranking = reader
            .deserialize::<BetaRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DashboardSnapshot {
            beta_ranking,
            ..DashboardSnapshot::default()
        })
    }

    fn describe(&self) -> String {
        format!("coefficient table {}", self.path.display())
    }
}

// ========================================================================================
//                                    Refreshing
// ========================================================================================

/// The simulator inputs obtained from a refresh attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveInputs {
    pub baselines: RegionBaselines,
    pub metrics: Option<ModelMetrics>,
    /// Published p-values of the coefficients, for known variables only.
    pub p_values: BTreeMap<Variable, f64>,
    /// National series ordered by year.
    pub trend: Vec<TrendPoint>,
    /// False when the source could not be reached and defaults are in use.
    pub live: bool,
}

impl LiveInputs {
    /// Inputs made only of defaults, as used when no source is configured.
    pub fn offline(fallback_base: f64) -> Self {
        Self {
            baselines: RegionBaselines::national_only(fallback_base),
            metrics: None,
            p_values: BTreeMap::new(),
            trend: DEFAULT_TREND.to_vec(),
            live: false,
        }
    }
}

/// Fetches from `source` and merges what it delivers into `store`.
pub fn refresh<S>(source: &S, store: &mut CoefficientStore, fallback_base: f64) -> LiveInputs
where
    S: DataSource + ?Sized,
{
    let snapshot = match source.fetch() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(
                "Live data unavailable from {}; using default coefficients and base value. ({e})",
                source.describe()
            );
            return LiveInputs::offline(fallback_base);
        }
    };

    let applied = store.update_named(snapshot.coefficients());
    let national = snapshot
        .mean_value
        .filter(|v| v.is_finite())
        .unwrap_or(fallback_base);

    let mut baselines = RegionBaselines::national_only(national);
    for row in &snapshot.cluster_profile {
        match (row.cluster.parse::<Region>(), row.mean_value) {
            (Ok(Region::Cluster(n)), Some(mean)) if mean.is_finite() => {
                baselines.clusters.insert(n, mean);
            }
            (Ok(Region::Cluster(n)), _) => {
                warn!("Cluster {n} has no usable mean outcome; its base will be scaled.");
                baselines.clusters.remove(&n);
            }
            (Ok(Region::National), _) => {}
            (Err(e), _) => warn!("Skipping cluster profile row: {e}"),
        }
    }

    let p_values: BTreeMap<Variable, f64> = snapshot
        .beta_ranking
        .iter()
        .filter_map(|row| {
            let p = row.p_value.filter(|p| p.is_finite())?;
            row.variable.parse::<Variable>().ok().map(|v| (v, p))
        })
        .collect();

    let mut trend: Vec<TrendPoint> = snapshot
        .trend_data
        .into_iter()
        .filter(|point| {
            let usable = point.mean_value.is_finite();
            if !usable {
                warn!("Skipping trend point for {} without a usable mean.", point.year);
            }
            usable
        })
        .collect();
    if trend.is_empty() {
        info!("{} delivered no trend series; showing the built-in one.", source.describe());
        trend = DEFAULT_TREND.to_vec();
    }
    trend.sort_by_key(|point| point.year);

    info!(
        "Loaded {applied} coefficient(s) and {} cluster baseline(s) from {}.",
        baselines.clusters.len(),
        source.describe()
    );

    LiveInputs {
        baselines,
        metrics: snapshot.metrics,
        p_values,
        trend,
        live: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    impl DataSource for Unreachable {
        fn fetch(&self) -> Result<DashboardSnapshot, SourceError> {
            Err(SourceError::Unavailable("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "unreachable backend".to_string()
        }
    }

    #[test]
    fn failure_keeps_store_and_uses_fallback_base() {
        let mut store = CoefficientStore::with_defaults();
        let inputs = refresh(&Unreachable, &mut store, DEFAULT_BASE_VALUE);
        assert!(!inputs.live);
        assert_eq!(inputs.baselines.national, DEFAULT_BASE_VALUE);
        assert!(inputs.baselines.clusters.is_empty());
        assert_eq!(store, CoefficientStore::with_defaults());
    }

    #[test]
    fn snapshot_rows_without_coefficient_are_ignored() {
        let snapshot = DashboardSnapshot {
            beta_ranking: vec![
                BetaRow {
                    variable: "NEET".to_string(),
                    coefficient: Some(-0.0082),
                    p_value: None,
                },
                BetaRow {
                    variable: "RLS".to_string(),
                    coefficient: None,
                    p_value: Some(0.2),
                },
            ],
            ..DashboardSnapshot::default()
        };
        let pairs: Vec<(&str, f64)> = snapshot.coefficients().collect();
        assert_eq!(pairs, vec![("NEET", -0.0082)]);
    }

    #[test]
    fn offline_inputs_carry_the_built_in_trend() {
        let inputs = LiveInputs::offline(DEFAULT_BASE_VALUE);
        assert_eq!(inputs.trend, DEFAULT_TREND.to_vec());
        assert!(inputs.p_values.is_empty());
    }

    #[test]
    fn latest_change_compares_the_last_two_years() {
        let change = latest_change(&DEFAULT_TREND).unwrap();
        assert_eq!(change.year, 2024);
        assert!((change.mean_delta - (0.3492 - 0.3520)).abs() < 1e-12);
        assert!((change.neet_delta.unwrap() - 0.3).abs() < 1e-9);

        let gap = [
            TrendPoint {
                year: 2023,
                mean_value: 0.35,
                neet: None,
            },
            TrendPoint {
                year: 2024,
                mean_value: 0.34,
                neet: Some(22.0),
            },
        ];
        assert_eq!(latest_change(&gap).unwrap().neet_delta, None);
        assert_eq!(latest_change(&gap[1..]), None);
        assert_eq!(latest_change(&[]), None);
    }
}
