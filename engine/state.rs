//! The adjustable scenario a user is building, one slider at a time.
//!
//! The state is an ordinary owned value: the caller creates it, adjusts it, and hands
//! it to the engine. Nothing here is global.

use crate::coefficients::CoefficientStore;
use crate::scenario::ScenarioChanges;
use crate::variable::Variable;
use serde::{Deserialize, Serialize};

/// Inputs exposed for adjustment, in display order.
pub const ADJUSTABLE_VARIABLES: [Variable; 4] = [
    Variable::Neet,
    Variable::Internet,
    Variable::Rls,
    Variable::P2,
];

/// Classification of the scenario as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStatus {
    /// Nothing has been adjusted.
    Unset,
    /// At least one input moves downwards.
    Mixed,
    /// Every adjusted input moves upwards.
    Positive,
}

/// What to simulate when the user has not adjusted anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoPolicy {
    pub enabled: bool,
    pub variable: Variable,
    pub change: f64,
}

impl Default for DemoPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            variable: Variable::Neet,
            change: 0.05,
        }
    }
}

impl DemoPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioState {
    changes: ScenarioChanges,
}

impl Default for ScenarioState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioState {
    /// Every adjustable input at zero.
    pub fn new() -> Self {
        Self {
            changes: ADJUSTABLE_VARIABLES.into_iter().map(|v| (v, 0.0)).collect(),
        }
    }

    /// Records a slider position given in percent (`5.0` means +5%).
    pub fn set_percent(&mut self, variable: Variable, percent: f64) {
        self.changes.set(variable, percent / 100.0);
    }

    pub fn percent(&self, variable: Variable) -> f64 {
        self.changes.get(variable) * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn changes(&self) -> &ScenarioChanges {
        &self.changes
    }

    /// Sum of the absolute adjustments, in percent.
    pub fn total_adjustment_percent(&self) -> f64 {
        self.changes.iter().map(|(_, change)| change.abs() * 100.0).sum()
    }

    pub fn status(&self) -> ScenarioStatus {
        if self.total_adjustment_percent() == 0.0 {
            ScenarioStatus::Unset
        } else if self.changes.iter().any(|(_, change)| change < 0.0) {
            ScenarioStatus::Mixed
        } else {
            ScenarioStatus::Positive
        }
    }

    /// A base-free preview of the outcome movement for the current sliders.
    pub fn quick_estimate(&self, store: &CoefficientStore) -> f64 {
        self.changes
            .iter()
            .fold(0.0, |acc, (variable, change)| acc + change * store.get(variable))
    }

    /// The changes to submit for simulation: only the adjusted inputs, or the demo
    /// change when nothing has been adjusted and the policy allows it.
    pub fn payload(&self, policy: &DemoPolicy) -> ScenarioChanges {
        let payload = self.changes.non_zero();
        if payload.is_empty() && policy.enabled {
            return ScenarioChanges::new().with(policy.variable, policy.change);
        }
        payload
    }
}
