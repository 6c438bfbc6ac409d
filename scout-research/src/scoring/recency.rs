//! Recency decay

use chrono::{DateTime, Utc};

/// Exponential half-life decay of a timestamp's age, in points
///
/// Future timestamps score the full `max_points`; the result is always in
/// `[0, max_points]`.
pub fn recency_score(
    published: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_days: f64,
    max_points: f64,
) -> f64 {
    if max_points <= 0.0 {
        return 0.0;
    }
    let age_days = (now - published).num_seconds() as f64 / 86_400.0;
    if age_days <= 0.0 {
        return max_points;
    }
    if half_life_days <= 0.0 {
        return 0.0;
    }
    let decayed = max_points * 0.5_f64.powf(age_days / half_life_days);
    decayed.clamp(0.0, max_points)
}

/// Whole days between `published` and `now` (0 for future timestamps)
pub fn age_days(published: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - published).num_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn half_life_halves_points() {
        let now = Utc::now();
        let score = recency_score(now - Duration::days(30), now, 30.0, 30.0);
        assert!((score - 15.0).abs() < 0.01);
    }

    #[test]
    fn future_dates_score_full() {
        let now = Utc::now();
        assert_eq!(recency_score(now + Duration::days(2), now, 30.0, 30.0), 30.0);
    }

    #[test]
    fn very_old_dates_approach_zero() {
        let now = Utc::now();
        let score = recency_score(now - Duration::days(3650), now, 30.0, 30.0);
        assert!(score >= 0.0 && score < 0.001);
    }
}
