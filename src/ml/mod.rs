pub mod artifact;
pub mod boosted;
pub mod ensemble;
pub mod features;
pub mod linear;
pub mod training;

pub use artifact::{ModelArtifact, ModelHandle, TrainingSummary};
pub use ensemble::{EnsemblePredictor, PredictiveModel};
pub use features::{extract_features, latest_features, RateFeatures};
pub use training::train_model;
