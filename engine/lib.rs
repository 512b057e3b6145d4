#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Scenario simulation for the HCLE index: a linear what-if engine over regression
//! coefficients, with the region, state and data-source plumbing around it.

pub mod coefficients;
pub mod config;
pub mod region;
pub mod scenario;
pub mod source;
pub mod state;
pub mod variable;

pub use coefficients::{CoefficientStore, DEFAULT_COEFFICIENTS};
pub use region::{ClusterScaling, Region, RegionBaselines};
pub use scenario::{
    Attribution, Contribution, ImpactDirection, ScenarioChanges, SimulationResult,
    attribution_percentage, compute_contribution, simulate,
};
pub use source::{DEFAULT_BASE_VALUE, DataSource, DashboardSnapshot, LiveInputs, refresh};
pub use state::{DemoPolicy, ScenarioState, ScenarioStatus};
pub use variable::Variable;
