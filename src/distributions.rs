//! Sampling distributions for event timing
//!
//! Event delays in the model are exponential; lengths of stay are drawn
//! from a two-component gamma mixture fit to empirical stay data (a single
//! gamma underestimates the long-stay tail). Both are exposed behind the
//! [`LengthOfStay`] variant type so every facility type carries an explicit
//! stay distribution.

use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma};

use crate::error::SimError;

/// Floor applied to gamma shapes and scales to avoid degenerate
/// parameterizations.
const MIN_GAMMA_PARAM: f64 = 1e-12;

/// A two-component gamma mixture
///
/// Sampling draws a Bernoulli(`prob1`) indicator and returns a sample from
/// the first gamma component on success, else the second. The mean is the
/// probability-weighted mean of the components.
#[derive(Debug, Clone, Copy)]
pub struct MixedGamma {
    comp1: Gamma<f64>,
    comp2: Gamma<f64>,
    prob1: f64,
    mean: f64,
}

impl MixedGamma {
    /// Construct a mixture from per-component shape/scale and the
    /// first-component probability
    ///
    /// Shapes and scales are clamped to a strictly positive floor.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameter` if `prob1` lies outside
    /// `[0, 1]`.
    pub fn new(
        shape1: f64,
        scale1: f64,
        shape2: f64,
        scale2: f64,
        prob1: f64,
    ) -> Result<MixedGamma, SimError> {
        if !(0.0..=1.0).contains(&prob1) {
            return Err(SimError::InvalidParameter(format!(
                "mixture probability {prob1} out of bounds [0, 1]"
            )));
        }
        let shape1 = shape1.max(MIN_GAMMA_PARAM);
        let scale1 = scale1.max(MIN_GAMMA_PARAM);
        let shape2 = shape2.max(MIN_GAMMA_PARAM);
        let scale2 = scale2.max(MIN_GAMMA_PARAM);
        let comp1 = Gamma::new(shape1, scale1)
            .map_err(|e| SimError::InvalidParameter(format!("gamma component 1: {e}")))?;
        let comp2 = Gamma::new(shape2, scale2)
            .map_err(|e| SimError::InvalidParameter(format!("gamma component 2: {e}")))?;
        Ok(MixedGamma {
            comp1,
            comp2,
            prob1,
            mean: prob1 * shape1 * scale1 + (1.0 - prob1) * shape2 * scale2,
        })
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl Distribution<f64> for MixedGamma {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if rng.random::<f64>() < self.prob1 {
            self.comp1.sample(rng)
        } else {
            self.comp2.sample(rng)
        }
    }
}

/// A length-of-stay distribution
///
/// Long-term acute care stays use the gamma mixture; other facility types
/// use a plain exponential. There is deliberately no "no discharge"
/// variant: every admitted patient gets a discharge time.
#[derive(Debug, Clone, Copy)]
pub enum LengthOfStay {
    MixedGamma(MixedGamma),
    Exponential { dist: Exp<f64>, mean: f64 },
}

impl LengthOfStay {
    /// An exponential stay distribution with the given mean
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameter` unless the mean is strictly
    /// positive and finite.
    pub fn exponential(mean: f64) -> Result<LengthOfStay, SimError> {
        if !(mean.is_finite() && mean > 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "mean length of stay must be positive, got {mean}"
            )));
        }
        let dist = Exp::new(1.0 / mean)
            .map_err(|e| SimError::InvalidParameter(format!("exponential stay: {e}")))?;
        Ok(LengthOfStay::Exponential { dist, mean })
    }

    /// A two-component gamma-mixture stay distribution
    ///
    /// # Errors
    ///
    /// See [`MixedGamma::new`].
    pub fn mixed_gamma(
        shape1: f64,
        scale1: f64,
        shape2: f64,
        scale2: f64,
        prob1: f64,
    ) -> Result<LengthOfStay, SimError> {
        Ok(LengthOfStay::MixedGamma(MixedGamma::new(
            shape1, scale1, shape2, scale2, prob1,
        )?))
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        match self {
            LengthOfStay::MixedGamma(mixture) => mixture.mean(),
            LengthOfStay::Exponential { mean, .. } => *mean,
        }
    }
}

impl Distribution<f64> for LengthOfStay {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            LengthOfStay::MixedGamma(mixture) => mixture.sample(rng),
            LengthOfStay::Exponential { dist, .. } => dist.sample(rng),
        }
    }
}
