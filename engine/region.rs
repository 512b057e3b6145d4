//! Region selection and region-specific baselines.
//!
//! The simulator always works from an already-adjusted base value. This module owns the
//! policy that derives that value: a cluster's own mean outcome when the backend has
//! published one, otherwise the national mean scaled by a per-cluster factor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error(
        "Unrecognized region '{0}'. Use 'National' or 'Cluster N' (also accepted: 'Nasional', 'Kluster N')."
    )]
    Unrecognized(String),
}

/// The population a scenario is simulated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Region {
    #[default]
    National,
    Cluster(u8),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::National => f.write_str("National"),
            Self::Cluster(n) => write!(f, "Cluster {n}"),
        }
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower == "national" || lower == "nasional" {
            return Ok(Self::National);
        }

        let number = lower
            .strip_prefix("cluster")
            .or_else(|| lower.strip_prefix("kluster"))
            .map(str::trim);
        match number.and_then(|n| n.parse::<u8>().ok()) {
            Some(n) => Ok(Self::Cluster(n)),
            None => Err(RegionError::Unrecognized(trimmed.to_string())),
        }
    }
}

/// Scales the national base for a cluster by `offset + step * n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterScaling {
    pub offset: f64,
    pub step: f64,
}

impl Default for ClusterScaling {
    fn default() -> Self {
        Self {
            offset: 0.8,
            step: 0.1,
        }
    }
}

impl ClusterScaling {
    pub fn factor(&self, region: Region) -> f64 {
        match region {
            Region::National => 1.0,
            Region::Cluster(n) => self.offset + self.step * f64::from(n),
        }
    }

    pub fn adjust_base(&self, national_base: f64, region: Region) -> f64 {
        national_base * self.factor(region)
    }
}

/// Known outcome means: the national mean and, where published, one per cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionBaselines {
    pub national: f64,
    pub clusters: BTreeMap<u8, f64>,
}

impl RegionBaselines {
    pub fn national_only(national: f64) -> Self {
        Self {
            national,
            clusters: BTreeMap::new(),
        }
    }

    /// The base value to simulate `region` from.
    pub fn base_for(&self, region: Region, scaling: &ClusterScaling) -> f64 {
        match region {
            Region::National => self.national,
            Region::Cluster(n) => match self.clusters.get(&n) {
                Some(mean) => *mean,
                None => scaling.adjust_base(self.national, region),
            },
        }
    }

    /// Every selectable region: national first, then clusters in ascending order.
    pub fn regions(&self) -> Vec<Region> {
        std::iter::once(Region::National)
            .chain(self.clusters.keys().map(|n| Region::Cluster(*n)))
            .collect()
    }
}
