//! Decision context: predictive model seam and the engine around it.

mod engine;
mod model;

pub use engine::{translate, DecisionConfig, DecisionContext, DecisionEngine};
pub use model::{
    AnomalySummary, ModelError, ModelInput, ModelOutput, ModelResult, PredictiveModel,
    RuleBasedModel,
};
