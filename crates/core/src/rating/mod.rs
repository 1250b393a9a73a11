//! Difficulty rating hooks.
//!
//! The toolkit ships no star rating model. Programs embedding the core plug
//! one in through [`StarRatingEstimator`] and read it with [`rating_or_zero`];
//! [`level_from_star_rating`] maps the result onto the community level scale.

use crate::{HitObject, Result};

const LINEAR_UPPER: f64 = 2.762_578_567_394_98;
const EXPONENTIAL_UPPER: f64 = 10.554_183_471_637_6;
const RATING_CEILING: f64 = 12.345_678_9;

/// Difficulty scoring backend. Implemented outside this crate; results are
/// informational only.
pub trait StarRatingEstimator {
    fn estimate(
        &self,
        hit_objects: &[HitObject],
        overall_difficulty: f64,
        key_count: usize,
        rate: f64,
    ) -> Result<f64>;
}

/// Runs `estimator`, substituting 0 when it fails or returns a non-finite value.
pub fn rating_or_zero(
    estimator: &dyn StarRatingEstimator,
    hit_objects: &[HitObject],
    overall_difficulty: f64,
    key_count: usize,
    rate: f64,
) -> f64 {
    match estimator.estimate(hit_objects, overall_difficulty, key_count, rate) {
        Ok(rating) if rating.is_finite() => rating,
        Ok(rating) => {
            tracing::warn!(rating, "star rating is not finite, using 0");
            0.0
        }
        Err(err) => {
            tracing::warn!(%err, "star rating failed, using 0");
            0.0
        }
    }
}

/// Maps a star rating onto the community level scale.
pub fn level_from_star_rating(star_rating: f64) -> Option<f64> {
    if star_rating.is_nan() || star_rating <= 0.0 {
        return None;
    }
    let level = if star_rating < LINEAR_UPPER {
        3.6198 * star_rating
    } else if star_rating < EXPONENTIAL_UPPER {
        6.9615 * (0.1374 * star_rating).exp()
    } else if star_rating < RATING_CEILING {
        2.791 * star_rating + 0.5436
    } else {
        return None;
    };
    Some(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolkitError;

    struct Fixed(Result<f64>);

    impl StarRatingEstimator for Fixed {
        fn estimate(&self, hit_objects: &[HitObject], _: f64, _: usize, rate: f64) -> Result<f64> {
            match &self.0 {
                Ok(value) => Ok(value * rate + hit_objects.len() as f64),
                Err(_) => Err(ToolkitError::validation("no notes")),
            }
        }
    }

    #[test]
    fn passes_ratings_through() {
        let rating = rating_or_zero(&Fixed(Ok(3.5)), &[], 8.0, 4, 1.0);
        assert_eq!(rating, 3.5);
        assert_eq!(rating_or_zero(&Fixed(Ok(2.0)), &[], 8.0, 4, 1.5), 3.0);
    }

    #[test]
    fn failures_become_zero() {
        let failing = Fixed(Err(ToolkitError::validation("x")));
        assert_eq!(rating_or_zero(&failing, &[], 8.0, 4, 1.0), 0.0);
        assert_eq!(rating_or_zero(&Fixed(Ok(f64::NAN)), &[], 8.0, 4, 1.0), 0.0);
    }

    #[test]
    fn level_scale_is_piecewise() {
        assert_eq!(level_from_star_rating(0.0), None);
        assert_eq!(level_from_star_rating(-1.0), None);
        assert_eq!(level_from_star_rating(f64::NAN), None);
        assert_eq!(level_from_star_rating(12.5), None);

        let low = level_from_star_rating(2.0).unwrap();
        assert!((low - 7.2396).abs() < 1e-9);
        let mid = level_from_star_rating(5.0).unwrap();
        assert!((mid - 6.9615 * 0.687_f64.exp()).abs() < 1e-9);
        let high = level_from_star_rating(11.0).unwrap();
        assert!((high - 31.2446).abs() < 1e-9);
    }

    #[test]
    fn level_scale_is_nearly_continuous() {
        let below = level_from_star_rating(LINEAR_UPPER - 1e-9).unwrap();
        let above = level_from_star_rating(LINEAR_UPPER).unwrap();
        assert!((below - above).abs() < 0.2, "{below} vs {above}");
    }
}
