// ========================================================================================
//
//                     The coefficient store: regression weights per input
//
// ========================================================================================
//
// The store starts from a built-in set of fixed-effect regression weights and can be
// refreshed from a fresher mapping. Refreshing is a best-effort merge: entries that are
// absent, unknown or non-finite leave the previous value in place.

use crate::variable::Variable;
use itertools::Itertools;
use log::{debug, warn};
use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::ops::Deref;

/// Fixed-effect regression weights shipped with the simulator. These are used whenever
/// a fresher mapping has not been obtained.
pub const DEFAULT_COEFFICIENTS: [(Variable, f64); Variable::COUNT] = [
    (Variable::Neet, 0.0056),
    (Variable::Internet, -0.1580),
    (Variable::Rls, -0.0335),
    (Variable::P1, 0.0332),
    (Variable::P2, 0.0824),
    (Variable::Hls, -0.0210),
];

/// Dense coefficient vector, indexed by [`Variable::index`].
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficients(pub Array1<f64>);

impl Coefficients {
    pub fn zeros() -> Self {
        Self(Array1::zeros(Variable::COUNT))
    }

    pub fn defaults() -> Self {
        let mut values = Self::zeros();
        for (variable, coefficient) in DEFAULT_COEFFICIENTS {
            values.0[variable.index()] = coefficient;
        }
        values
    }

    #[inline]
    pub fn get(&self, variable: Variable) -> f64 {
        self.0[variable.index()]
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for Coefficients {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// One row of the magnitude ranking: which lever moves the outcome the most.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedCoefficient {
    pub variable: Variable,
    pub coefficient: f64,
    pub magnitude: f64,
}

/// Holds the current regression weight of every model variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientStore {
    coefficients: Coefficients,
    refreshed: bool,
}

impl Default for CoefficientStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CoefficientStore {
    /// A store holding [`DEFAULT_COEFFICIENTS`].
    pub fn with_defaults() -> Self {
        Self {
            coefficients: Coefficients::defaults(),
            refreshed: false,
        }
    }

    /// The current weight for `variable`.
    #[inline]
    pub fn get(&self, variable: Variable) -> f64 {
        self.coefficients.get(variable)
    }

    /// The current weight for a variable given by name. A name that is not a model
    /// variable has no coefficient at all and weighs zero.
    pub fn get_named(&self, name: &str) -> f64 {
        match name.parse::<Variable>() {
            Ok(variable) => self.get(variable),
            Err(e) => {
                warn!("{e} Treating its coefficient as 0.");
                0.0
            }
        }
    }

    /// Merges `mapping` into the store. Variables not present in `mapping` keep their
    /// current weight; non-finite weights are skipped. Returns how many entries were
    /// applied.
    pub fn update<I>(&mut self, mapping: I) -> usize
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let mut applied = 0;
        for (variable, coefficient) in mapping {
            if !coefficient.is_finite() {
                warn!("Ignoring non-finite coefficient {coefficient} for {variable}.");
                continue;
            }
            self.coefficients.0[variable.index()] = coefficient;
            applied += 1;
        }
        if applied > 0 {
            self.refreshed = true;
            debug!("Merged {applied} coefficient(s) into the store.");
        }
        applied
    }

    /// Like [`CoefficientStore::update`], but keyed by variable name as delivered by
    /// external sources. Unknown names are logged and skipped.
    pub fn update_named<'a, I>(&mut self, mapping: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let parsed: Vec<(Variable, f64)> = mapping
            .into_iter()
            .filter_map(|(name, coefficient)| match name.parse::<Variable>() {
                Ok(variable) => Some((variable, coefficient)),
                Err(e) => {
                    warn!("Skipping coefficient: {e}");
                    None
                }
            })
            .collect();
        self.update(parsed)
    }

    /// Whether any entry has been merged in since construction.
    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        Variable::ALL.into_iter().map(|v| (v, self.get(v)))
    }

    /// Variables ordered by the absolute size of their weight, largest first. Ties keep
    /// the canonical variable order.
    pub fn ranking(&self) -> Vec<RankedCoefficient> {
        let magnitudes = self.coefficients.mapv(f64::abs);
        Variable::ALL
            .into_iter()
            .map(|variable| RankedCoefficient {
                variable,
                coefficient: self.get(variable),
                magnitude: magnitudes[variable.index()],
            })
            .sorted_by(|a, b| b.magnitude.total_cmp(&a.magnitude))
            .collect()
    }
}
