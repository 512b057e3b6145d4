// ========================================================================================
//
//                 The scenario engine: linear what-if prediction and attribution
//
// ========================================================================================
//
// Given a base outcome value and a set of fractional changes to model inputs, the engine
// predicts the outcome by adding `change * coefficient` for every input and attributes
// the resulting delta back to the inputs. It is a pure function of its arguments: it
// owns no state and never fails. Anything that can go wrong (unknown inputs, non-finite
// numbers, zero totals) is resolved to a neutral numeric value.

use crate::coefficients::CoefficientStore;
use crate::variable::Variable;
use log::{debug, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ========================================================================================
//                                  Scenario inputs
// ========================================================================================

/// Fractional changes per variable (`0.05` is a five percent increase). Variables that
/// were never set are implicitly unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioChanges(BTreeMap<Variable, f64>);

impl ScenarioChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the change for `variable`. Non-finite values are rejected and leave the
    /// previous entry in place.
    pub fn set(&mut self, variable: Variable, change: f64) {
        if !change.is_finite() {
            warn!("Ignoring non-finite change {change} for {variable}.");
            return;
        }
        self.0.insert(variable, change);
    }

    pub fn with(mut self, variable: Variable, change: f64) -> Self {
        self.set(variable, change);
        self
    }

    /// The change for `variable`, zero when unset.
    pub fn get(&self, variable: Variable) -> f64 {
        self.0.get(&variable).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.0.contains_key(&variable)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        self.0.iter().map(|(v, c)| (*v, *c))
    }

    /// Only the entries whose change is not zero.
    pub fn non_zero(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, change)| **change != 0.0)
                .map(|(v, c)| (*v, *c))
                .collect(),
        )
    }

    /// Builds a scenario from string-keyed changes as delivered by external callers.
    /// Names that are not model variables cannot contribute and are dropped.
    pub fn from_named<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut changes = Self::new();
        for (name, change) in entries {
            match name.parse::<Variable>() {
                Ok(variable) => changes.set(variable, change),
                Err(e) => warn!("{e} Its change contributes nothing."),
            }
        }
        changes
    }

    /// The scenario as a dense vector indexed by [`Variable::index`].
    pub fn to_dense(&self) -> Array1<f64> {
        let mut dense = Array1::zeros(Variable::COUNT);
        for (variable, change) in self.iter() {
            dense[variable.index()] = change;
        }
        dense
    }
}

impl FromIterator<(Variable, f64)> for ScenarioChanges {
    fn from_iter<T: IntoIterator<Item = (Variable, f64)>>(iter: T) -> Self {
        let mut changes = Self::new();
        for (variable, change) in iter {
            changes.set(variable, change);
        }
        changes
    }
}

// ========================================================================================
//                                  Scenario outputs
// ========================================================================================

/// What one variable's change does to the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub change: f64,
    pub impact: f64,
}

/// The sign of a predicted movement of the outcome. A lower HCLE is the favourable
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactDirection {
    Decrease,
    Increase,
    Unchanged,
}

impl ImpactDirection {
    pub fn from_delta(delta: f64) -> Self {
        if delta < 0.0 {
            Self::Decrease
        } else if delta > 0.0 {
            Self::Increase
        } else {
            Self::Unchanged
        }
    }

    pub fn is_favourable(self) -> bool {
        matches!(self, Self::Decrease)
    }
}

impl fmt::Display for ImpactDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Decrease => "decrease (favourable)",
            Self::Increase => "increase (needs attention)",
            Self::Unchanged => "unchanged",
        })
    }
}

/// Share of the total delta attributable to one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Attribution {
    pub variable: Variable,
    pub contribution: Contribution,
    pub percent: f64,
}

/// The outcome of one simulation run.
///
/// `total_delta` is the signed sum of impacts unless the prediction had to be clamped
/// at zero, in which case it is the distance actually travelled, `|predicted - base|`.
/// The unclamped sum is always available as `impact_sum`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub base_value: f64,
    pub predicted_value: f64,
    pub total_delta: f64,
    pub impact_sum: f64,
    pub clamped: bool,
    pub contributions: BTreeMap<Variable, Contribution>,
}

impl SimulationResult {
    pub fn direction(&self) -> ImpactDirection {
        ImpactDirection::from_delta(self.impact_sum)
    }

    /// Per-variable share of the unclamped impact, in canonical variable order. The
    /// percentages sum to 100 whenever any impact is non-zero and all impacts share a
    /// sign.
    pub fn attributions(&self) -> Vec<Attribution> {
        self.contributions
            .iter()
            .map(|(variable, contribution)| Attribution {
                variable: *variable,
                contribution: *contribution,
                percent: attribution_percentage(contribution, self.impact_sum),
            })
            .collect()
    }

    /// Relative fall of the outcome, in percent of the base. Positive means the
    /// outcome went down.
    pub fn relative_change_percent(&self) -> f64 {
        if self.base_value == 0.0 {
            return 0.0;
        }
        (self.base_value - self.predicted_value) / self.base_value * 100.0
    }
}

// ========================================================================================
//                                   The computation
// ========================================================================================

/// The impact of changing `variable` by `change`: `change * coefficient`.
#[inline]
pub fn compute_contribution(
    variable: Variable,
    change: f64,
    store: &CoefficientStore,
) -> Contribution {
    Contribution {
        change,
        impact: change * store.get(variable),
    }
}

/// Predicts the outcome of applying `changes` to `base_value`.
///
/// Every variable present in `changes` receives a contribution, including ones whose
/// change is zero. When the changes push the outcome below zero the prediction is
/// clamped at zero; a scenario without net downward impact returns the base untouched.
pub fn simulate(
    base_value: f64,
    changes: &ScenarioChanges,
    store: &CoefficientStore,
) -> SimulationResult {
    let contributions: BTreeMap<Variable, Contribution> = changes
        .iter()
        .map(|(variable, change)| (variable, compute_contribution(variable, change, store)))
        .collect();

    let impact_sum = contributions.values().fold(0.0, |acc, c| acc + c.impact);
    let unclamped = base_value + impact_sum;
    let clamped = impact_sum < 0.0 && unclamped < 0.0;
    let predicted_value = if clamped { 0.0 } else { unclamped };
    let total_delta = if clamped {
        (predicted_value - base_value).abs()
    } else {
        impact_sum
    };

    debug!(
        "Simulated {} change(s): base {base_value:.4} -> {predicted_value:.4} (impact {impact_sum:.6}{})",
        contributions.len(),
        if clamped { ", clamped at zero" } else { "" }
    );

    SimulationResult {
        base_value,
        predicted_value,
        total_delta,
        impact_sum,
        clamped,
        contributions,
    }
}

/// `|impact| / |total_delta| * 100`, or zero when there is no delta to attribute.
pub fn attribution_percentage(contribution: &Contribution, total_delta: f64) -> f64 {
    if total_delta == 0.0 {
        return 0.0;
    }
    (contribution.impact / total_delta).abs() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn contribution_is_change_times_weight() {
        let store = CoefficientStore::with_defaults();
        let c = compute_contribution(Variable::Internet, -0.10, &store);
        assert_abs_diff_eq!(c.change, -0.10);
        assert_abs_diff_eq!(c.impact, 0.0158, epsilon = 1e-12);
    }

    #[test]
    fn zero_entries_change_nothing_numerically() {
        let store = CoefficientStore::with_defaults();
        let sparse = ScenarioChanges::new().with(Variable::Neet, 0.05);
        let padded = sparse.clone().with(Variable::Rls, 0.0).with(Variable::P2, 0.0);

        let a = simulate(0.3492, &sparse, &store);
        let b = simulate(0.3492, &padded, &store);
        assert_eq!(a.predicted_value, b.predicted_value);
        assert_eq!(a.total_delta, b.total_delta);
        assert_eq!(b.contributions[&Variable::Rls].impact, 0.0);
    }

    #[test]
    fn non_finite_changes_are_not_recorded() {
        let changes = ScenarioChanges::new()
            .with(Variable::Neet, f64::INFINITY)
            .with(Variable::Hls, 0.1);
        assert!(!changes.contains(Variable::Neet));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn non_zero_filters_out_unchanged_inputs() {
        let changes = ScenarioChanges::new()
            .with(Variable::Neet, 0.0)
            .with(Variable::P2, -0.2);
        let filtered = changes.non_zero();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get(Variable::P2), -0.2);
        assert_eq!(filtered.get(Variable::Neet), 0.0);
    }

    #[test]
    fn unknown_names_are_dropped() {
        let changes = ScenarioChanges::from_named([("NEET", 0.05), ("GDP", 0.3)]);
        assert_eq!(changes.len(), 1);
        assert_abs_diff_eq!(changes.get(Variable::Neet), 0.05);
    }

    #[test]
    fn dense_view_places_changes_by_index() {
        let changes = ScenarioChanges::new().with(Variable::Hls, 0.25);
        let dense = changes.to_dense();
        assert_eq!(dense.len(), Variable::COUNT);
        assert_eq!(dense[Variable::Hls.index()], 0.25);
        assert_eq!(dense.sum(), 0.25);
    }

    #[test]
    fn direction_follows_sign_of_impact() {
        assert_eq!(ImpactDirection::from_delta(-0.01), ImpactDirection::Decrease);
        assert_eq!(ImpactDirection::from_delta(0.01), ImpactDirection::Increase);
        assert_eq!(ImpactDirection::from_delta(0.0), ImpactDirection::Unchanged);
        assert!(ImpactDirection::Decrease.is_favourable());
        assert!(!ImpactDirection::Increase.is_favourable());
    }

    #[test]
    fn attribution_with_zero_total_is_zero() {
        let c = Contribution {
            change: 0.1,
            impact: 0.0,
        };
        assert_eq!(attribution_percentage(&c, 0.0), 0.0);
    }

    #[test]
    fn relative_change_handles_zero_base() {
        let store = CoefficientStore::with_defaults();
        let result = simulate(0.0, &ScenarioChanges::new(), &store);
        assert_eq!(result.relative_change_percent(), 0.0);
    }
}
