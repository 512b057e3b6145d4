// ========================================================================================
//
//                       The model inputs: a closed set of predictors
//
// ========================================================================================
//
// The regression behind the HCLE index is fitted on exactly six provincial indicators.
// Everything downstream (the coefficient store, scenarios, attribution) is keyed by
// this enum, so an unknown indicator can only appear at the string boundary, where it
// is parsed and rejected here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named socioeconomic input of the HCLE regression model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    /// Share of youth not in employment, education or training.
    #[serde(rename = "NEET")]
    Neet,
    /// Poverty depth index.
    #[serde(rename = "P1")]
    P1,
    /// Poverty severity index.
    #[serde(rename = "P2")]
    P2,
    /// Household internet access rate.
    #[serde(rename = "Internet")]
    Internet,
    /// Average years of schooling.
    #[serde(rename = "RLS")]
    Rls,
    /// Expected years of schooling.
    #[serde(rename = "HLS")]
    Hls,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error(
        "Unknown model variable '{0}'. Expected one of NEET, P1, P2, Internet, RLS or HLS."
    )]
    Unknown(String),
}

impl Variable {
    pub const COUNT: usize = 6;

    /// Canonical order, matching the column order of the fitted model.
    pub const ALL: [Variable; Variable::COUNT] = [
        Variable::Neet,
        Variable::P1,
        Variable::P2,
        Variable::Internet,
        Variable::Rls,
        Variable::Hls,
    ];

    /// Position of this variable in [`Variable::ALL`] and in every dense vector
    /// indexed by variable.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Neet => 0,
            Self::P1 => 1,
            Self::P2 => 2,
            Self::Internet => 3,
            Self::Rls => 4,
            Self::Hls => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Neet => "NEET",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::Internet => "Internet",
            Self::Rls => "RLS",
            Self::Hls => "HLS",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Neet => "youth not in employment, education or training",
            Self::P1 => "poverty depth",
            Self::P2 => "poverty severity",
            Self::Internet => "internet access",
            Self::Rls => "average years of schooling",
            Self::Hls => "expected years of schooling",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = VariableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Variable::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| VariableError::Unknown(trimmed.to_string()))
    }
}
