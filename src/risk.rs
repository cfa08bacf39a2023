//! BMI to cardiac-event risk model.
//!
//! Below the risk band the label is always "No", above it always "Yes".
//! Inside the band (22, 38] the probability of "Yes" rises linearly and
//! the label is drawn from the randomness source, so repeated calls with
//! the same BMI may disagree.

use crate::error::CoreError;
use crate::models::CardiacEvent;
use crate::randomness::RandomnessSource;

/// Lowest BMI accepted by the model.
pub const BMI_MIN: f64 = 9.0;
/// Highest BMI accepted by the model.
pub const BMI_MAX: f64 = 83.0;
/// Lower edge of the risk band (exclusive).
pub const RISK_BAND_LOW: f64 = 22.0;
/// Upper edge of the risk band (inclusive).
pub const RISK_BAND_HIGH: f64 = 38.0;

/// Probability of a cardiac event for a BMI, or `None` when the label is
/// deterministic for that value.
pub fn event_probability(bmi: f64) -> Result<Option<f64>, CoreError> {
    if !bmi.is_finite() || !(BMI_MIN..=BMI_MAX).contains(&bmi) {
        return Err(CoreError::Domain(format!(
            "BMI value should be between {BMI_MIN} and {BMI_MAX}, got {bmi}"
        )));
    }
    if bmi <= RISK_BAND_LOW || bmi > RISK_BAND_HIGH {
        return Ok(None);
    }
    Ok(Some((bmi - RISK_BAND_LOW) / (RISK_BAND_HIGH - RISK_BAND_LOW)))
}

/// Labels a BMI. Consumes exactly one uniform draw inside the risk band
/// and none outside it.
pub fn classify<R: RandomnessSource + ?Sized>(
    bmi: f64,
    rng: &mut R,
) -> Result<CardiacEvent, CoreError> {
    let label = match event_probability(bmi)? {
        None if bmi <= RISK_BAND_LOW => CardiacEvent::No,
        None => CardiacEvent::Yes,
        Some(risk) => {
            if rng.uniform()? < risk {
                CardiacEvent::Yes
            } else {
                CardiacEvent::No
            }
        }
    };
    tracing::debug!(bmi, label = label.as_str(), "Classified cardiac risk");
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomness::testing::Scripted;
    use crate::randomness::StdRandom;

    #[test]
    fn low_bmi_is_always_no_without_drawing() {
        let mut src = Scripted::new(&[]);
        for bmi in [9.0, 15.5, 21.99, 22.0] {
            assert_eq!(classify(bmi, &mut src).unwrap(), CardiacEvent::No);
        }
        assert_eq!(src.consumed, 0);
    }

    #[test]
    fn high_bmi_is_always_yes_without_drawing() {
        let mut src = Scripted::new(&[]);
        for bmi in [38.01, 45.0, 83.0] {
            assert_eq!(classify(bmi, &mut src).unwrap(), CardiacEvent::Yes);
        }
        assert_eq!(src.consumed, 0);
    }

    #[test]
    fn out_of_range_bmi_is_domain_error() {
        let mut rng = StdRandom::seeded(0);
        assert!(matches!(classify(8.0, &mut rng), Err(CoreError::Domain(_))));
        assert!(matches!(classify(84.0, &mut rng), Err(CoreError::Domain(_))));
        assert!(matches!(classify(f64::NAN, &mut rng), Err(CoreError::Domain(_))));
    }

    #[test]
    fn band_compares_draw_against_interpolated_risk() {
        // BMI 26 -> risk 0.25
        let mut src = Scripted::new(&[0.24, 0.25, 0.9]);
        assert_eq!(classify(26.0, &mut src).unwrap(), CardiacEvent::Yes);
        assert_eq!(classify(26.0, &mut src).unwrap(), CardiacEvent::No);
        assert_eq!(classify(26.0, &mut src).unwrap(), CardiacEvent::No);
        assert_eq!(src.consumed, 3);
    }

    #[test]
    fn band_top_edge_is_stochastic_with_certain_yes() {
        // BMI 38 -> risk 1.0, any draw in [0, 1) is below it
        let mut src = Scripted::new(&[0.999]);
        assert_eq!(classify(38.0, &mut src).unwrap(), CardiacEvent::Yes);
        assert_eq!(src.consumed, 1);
    }

    #[test]
    fn midpoint_yes_fraction_converges_to_half() {
        let mut rng = StdRandom::seeded(2024);
        let trials = 10_000;
        let yes = (0..trials)
            .filter(|_| classify(30.0, &mut rng).unwrap() == CardiacEvent::Yes)
            .count();
        let fraction = yes as f64 / trials as f64;
        assert!((fraction - 0.5).abs() <= 0.02, "fraction was {fraction}");
    }

    #[test]
    fn probability_is_linear_in_band() {
        assert_eq!(event_probability(20.0).unwrap(), None);
        assert_eq!(event_probability(30.0).unwrap(), Some(0.5));
        assert_eq!(event_probability(34.0).unwrap(), Some(0.75));
        assert_eq!(event_probability(40.0).unwrap(), None);
    }
}
