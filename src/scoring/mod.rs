pub mod blend;
pub mod pipeline;

pub use blend::{blend_scores, build_reasoning, fallback_score, recommendation_for, round2};
pub use pipeline::{fallback_result, score_series};
