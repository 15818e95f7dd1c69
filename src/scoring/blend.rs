use crate::config::ScoringSettings;
use crate::types::Recommendation;

/// Scores are returned at 2 decimal places; thresholds apply to the
/// rounded value so the recommendation always agrees with the score the
/// caller can see.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted blend of the model probability and the percentile rank.
pub fn blend_scores(model_probability: f64, percentile: f64, settings: &ScoringSettings) -> f64 {
    let raw =
        settings.model_weight * model_probability + settings.percentile_weight * percentile;
    round2(raw.clamp(0.0, 1.0))
}

/// Percentile-only score. The model term is omitted entirely, not
/// re-weighted against a missing value.
pub fn fallback_score(percentile: f64) -> f64 {
    round2(percentile.clamp(0.0, 1.0))
}

pub fn recommendation_for(score: f64, settings: &ScoringSettings) -> Recommendation {
    if score > settings.send_now_threshold {
        Recommendation::SendNow
    } else if score >= settings.wait_threshold {
        Recommendation::Neutral
    } else {
        Recommendation::Wait
    }
}

/// Always cites the concrete percentile, never a bare qualifier.
pub fn build_reasoning(percentile: f64, recommendation: Recommendation) -> String {
    let pct = (percentile * 100.0).round() as i64;
    let context = format!(
        "Today's rate is better than {}% of days in the past 2 months.",
        pct
    );
    match recommendation {
        Recommendation::SendNow => format!("{} Favorable window to send.", context),
        Recommendation::Neutral => format!("{} No strong signal either way.", context),
        Recommendation::Wait => format!("{} A better rate is likely if you wait.", context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ScoringSettings {
        ScoringSettings::default()
    }

    #[test]
    fn test_blend_weights_and_rounds() {
        // 0.4 * 0.9 + 0.6 * 0.75 = 0.81
        assert_eq!(blend_scores(0.9, 0.75, &settings()), 0.81);
        assert_eq!(blend_scores(1.0, 1.0, &settings()), 1.0);
        assert_eq!(blend_scores(0.0, 0.0, &settings()), 0.0);
    }

    #[test]
    fn test_fallback_is_percentile_identity() {
        assert_eq!(fallback_score(0.75), 0.75);
        assert_eq!(fallback_score(1.0 / 60.0), 0.02);
        assert_eq!(fallback_score(1.0), 1.0);
    }

    #[test]
    fn test_thresholds_partition_the_unit_interval() {
        let s = settings();
        assert_eq!(recommendation_for(0.81, &s), Recommendation::SendNow);
        assert_eq!(recommendation_for(1.0, &s), Recommendation::SendNow);
        // The boundary itself is not "send now".
        assert_eq!(recommendation_for(0.80, &s), Recommendation::Neutral);
        assert_eq!(recommendation_for(0.50, &s), Recommendation::Neutral);
        assert_eq!(recommendation_for(0.49, &s), Recommendation::Wait);
        assert_eq!(recommendation_for(0.0, &s), Recommendation::Wait);
    }

    #[test]
    fn test_every_score_maps_to_exactly_one_recommendation() {
        let s = settings();
        for i in 0..=100 {
            let score = i as f64 / 100.0;
            // No panic and a total mapping is the property under test.
            let _ = recommendation_for(score, &s);
        }
    }

    #[test]
    fn test_reasoning_cites_the_number() {
        let text = build_reasoning(0.62, Recommendation::Neutral);
        assert!(text.contains("62%"), "missing percentile in: {text}");
        assert!(text.contains("past 2 months"));

        let text = build_reasoning(1.0 / 60.0, Recommendation::Wait);
        assert!(text.contains("2%"), "missing percentile in: {text}");
    }

    #[test]
    fn test_reasoning_varies_by_recommendation() {
        let send = build_reasoning(0.95, Recommendation::SendNow);
        let wait = build_reasoning(0.95, Recommendation::Wait);
        let neutral = build_reasoning(0.95, Recommendation::Neutral);
        assert_ne!(send, wait);
        assert_ne!(send, neutral);
        assert_ne!(wait, neutral);
    }
}
