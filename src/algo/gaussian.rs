//! Gaussian policy over continuous actions
//!
//! The network's raw outputs for one observation are turned into a
//! multivariate Gaussian with diagonal covariance:
//!
//! ```text
//! μ  = clamp(mean_raw, -1, 1)
//! Σ  = diag(softplus(spread_raw) + 1e-7)
//! ```
//!
//! The softplus output is used directly as the covariance diagonal. The floor
//! keeps every variance strictly positive; anything that still slips through
//! (NaN, infinities, shape mismatches) is rejected by [`DiagonalGaussian::new`]
//! instead of producing garbage samples.

use burn::{prelude::*, tensor::Distribution};

use crate::error::{Error, Result};

/// Added to the softplus output so no variance is ever zero
pub const MIN_VARIANCE: f32 = 1e-7;

/// ln(2π)
const LN_2PI: f32 = 1.837_877;

/// Multivariate normal distribution with a diagonal covariance matrix
#[derive(Debug, Clone)]
pub struct DiagonalGaussian<B: Backend> {
    mean: Tensor<B, 1>,
    variance: Tensor<B, 1>,
}

/// NaN or ±∞ anywhere in `x`
fn has_non_finite<B: Backend>(x: &Tensor<B, 1>) -> bool {
    x.is_nan().any().into_scalar() || x.clone().abs().equal_elem(f32::INFINITY).any().into_scalar()
}

impl<B: Backend> DiagonalGaussian<B> {
    /// Validated construction
    ///
    /// Fails unless `mean` and `variance` have the same non-zero length, every
    /// mean is finite and every variance is finite and strictly positive.
    pub fn new(mean: Tensor<B, 1>, variance: Tensor<B, 1>) -> Result<Self> {
        let [dim] = mean.dims();
        let [var_dim] = variance.dims();
        if dim == 0 {
            return Err(Error::InvalidDistribution(
                "a distribution needs at least one dimension".to_string(),
            ));
        }
        if dim != var_dim {
            return Err(Error::InvalidDistribution(format!(
                "mean has {dim} components but the covariance diagonal has {var_dim}"
            )));
        }

        if has_non_finite(&variance) || variance.clone().lower_equal_elem(0.0).any().into_scalar() {
            return Err(Error::InvalidDistribution(
                "variances must be finite and positive".to_string(),
            ));
        }
        if has_non_finite(&mean) {
            return Err(Error::InvalidDistribution("mean is not finite".to_string()));
        }

        Ok(Self { mean, variance })
    }

    /// Number of action components
    pub fn dim(&self) -> usize {
        self.mean.dims()[0]
    }

    pub fn mean(&self) -> Tensor<B, 1> {
        self.mean.clone()
    }

    /// Diagonal of the covariance matrix
    pub fn variance(&self) -> Tensor<B, 1> {
        self.variance.clone()
    }

    /// Draw one action
    ///
    /// The sample carries no gradient; gradients flow through
    /// [`log_prob`](Self::log_prob) instead.
    pub fn sample(&self) -> Tensor<B, 1> {
        let noise = self.mean.random_like(Distribution::Normal(0.0, 1.0));
        (self.mean.clone() + self.variance.clone().sqrt() * noise).detach()
    }

    /// log N(action; μ, Σ), shape `[1]`
    pub fn log_prob(&self, action: Tensor<B, 1>) -> Result<Tensor<B, 1>> {
        let [action_dim] = action.dims();
        if action_dim != self.dim() {
            return Err(Error::ActionDim {
                expected: self.dim(),
                actual: action_dim,
            });
        }

        let diff = action - self.mean.clone();
        let mahalanobis = (diff.powf_scalar(2.0) / self.variance.clone()).sum();
        let log_det = self.variance.clone().log().sum();

        Ok((mahalanobis + log_det)
            .add_scalar(self.dim() as f32 * LN_2PI)
            .mul_scalar(-0.5))
    }

    /// Differential entropy, shape `[1]`
    pub fn entropy(&self) -> Tensor<B, 1> {
        let k = self.dim() as f32;
        self.variance
            .clone()
            .log()
            .sum()
            .mul_scalar(0.5)
            .add_scalar(0.5 * k * (1.0 + LN_2PI))
    }
}

/// Policy for one observation: the action distribution and V(s)
#[derive(Debug, Clone)]
pub struct PolicyOutput<B: Backend> {
    pub distribution: DiagonalGaussian<B>,
    /// State value, shape `[1]`
    pub value: Tensor<B, 1>,
}

/// Build the Gaussian policy from raw network outputs for a single observation
///
/// `mean_raw` and `spread_raw` are `[1, action_dim]`, `value` is `[1, 1]`.
/// A scalar action space yields a one-component distribution.
pub fn gaussian_policy<B: Backend>(
    mean_raw: Tensor<B, 2>,
    spread_raw: Tensor<B, 2>,
    value: Tensor<B, 2>,
) -> Result<PolicyOutput<B>> {
    let [batch, action_dim] = mean_raw.dims();
    if batch != 1 {
        return Err(Error::InvalidDistribution(format!(
            "policy is built for a single observation, got a batch of {batch}"
        )));
    }

    let mean = mean_raw.clamp(-1.0, 1.0).reshape([action_dim]);
    let variance = softplus(spread_raw).add_scalar(MIN_VARIANCE).reshape([action_dim]);

    Ok(PolicyOutput {
        distribution: DiagonalGaussian::new(mean, variance)?,
        value: value.reshape([1]),
    })
}

/// ln(1 + eˣ) computed as max(x, 0) + ln(1 + e^-|x|); the naive form overflows for large x
fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clone().clamp_min(0.0) + x.abs().neg().exp().log1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    fn values(t: Tensor<TestBackend, 1>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    fn policy(mean: [[f32; 3]; 1], spread: [[f32; 3]; 1]) -> PolicyOutput<TestBackend> {
        let device = NdArrayDevice::default();
        gaussian_policy(
            Tensor::from_floats(mean, &device),
            Tensor::from_floats(spread, &device),
            Tensor::from_floats([[0.5]], &device),
        )
        .unwrap()
    }

    #[test]
    fn mean_is_clamped_to_unit_box() {
        let out = policy([[3.0, -7.0, 0.2]], [[0.0, 0.0, 0.0]]);
        let mean = values(out.distribution.mean());
        assert_eq!(mean, vec![1.0, -1.0, 0.2]);
        for m in mean {
            assert!((-1.0..=1.0).contains(&m));
        }
    }

    #[test]
    fn variance_is_positive_for_any_raw_spread() {
        let out = policy([[0.0, 0.0, 0.0]], [[-200.0, 0.0, 200.0]]);
        let var = values(out.distribution.variance());

        assert!(var.iter().all(|v| *v >= MIN_VARIANCE && v.is_finite()), "{var:?}");
        assert!((var[1] - std::f32::consts::LN_2).abs() < 1e-5);
        assert!((var[2] - 200.0).abs() < 1e-3);
    }

    #[test]
    fn value_is_passed_through() {
        let out = policy([[0.0, 0.0, 0.0]], [[0.0, 0.0, 0.0]]);
        assert_eq!(values(out.value), vec![0.5]);
    }

    #[test]
    fn scalar_action_space_yields_one_component() {
        let device = NdArrayDevice::default();
        let out = gaussian_policy::<TestBackend>(
            Tensor::from_floats([[0.3]], &device),
            Tensor::from_floats([[0.1]], &device),
            Tensor::from_floats([[0.0]], &device),
        )
        .unwrap();

        assert_eq!(out.distribution.dim(), 1);
        assert_eq!(out.distribution.sample().dims(), [1]);
    }

    #[test]
    fn rejects_batches() {
        let device = NdArrayDevice::default();
        let result = gaussian_policy::<TestBackend>(
            Tensor::zeros([2, 1], &device),
            Tensor::zeros([2, 1], &device),
            Tensor::zeros([2, 1], &device),
        );
        assert!(matches!(result, Err(Error::InvalidDistribution(_))));
    }

    #[test]
    fn construction_rejects_non_positive_variance() {
        let device = NdArrayDevice::default();
        let mean = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0], &device);

        for bad in [[1.0, 0.0], [1.0, -0.5], [f32::NAN, 1.0], [1.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
            let result = DiagonalGaussian::new(mean.clone(), Tensor::from_floats(bad, &device));
            assert!(matches!(result, Err(Error::InvalidDistribution(_))), "{bad:?}");
        }
    }

    #[test]
    fn construction_rejects_non_finite_mean() {
        let device = NdArrayDevice::default();
        let variance = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0], &device);

        for bad in [[f32::NAN, 0.0], [0.0, f32::NEG_INFINITY]] {
            let result = DiagonalGaussian::new(Tensor::from_floats(bad, &device), variance.clone());
            assert!(matches!(result, Err(Error::InvalidDistribution(_))), "{bad:?}");
        }
    }

    #[test]
    fn construction_rejects_shape_mismatch() {
        let device = NdArrayDevice::default();
        let result = DiagonalGaussian::<TestBackend>::new(
            Tensor::from_floats([0.0, 0.0], &device),
            Tensor::from_floats([1.0, 1.0, 1.0], &device),
        );
        assert!(matches!(result, Err(Error::InvalidDistribution(_))));
    }

    #[test]
    fn log_prob_matches_closed_form() {
        let device = NdArrayDevice::default();
        let dist = DiagonalGaussian::<TestBackend>::new(
            Tensor::from_floats([0.0, 1.0], &device),
            Tensor::from_floats([1.0, 4.0], &device),
        )
        .unwrap();

        let lp = dist.log_prob(Tensor::from_floats([0.5, 3.0], &device)).unwrap();
        let lp = values(lp)[0];

        // -0.5 * (0.25/1 + 4/4 + ln(1) + ln(4) + 2 ln(2π))
        let expected = -0.5 * (0.25 + 1.0 + 4.0_f32.ln() + 2.0 * LN_2PI);
        assert!((lp - expected).abs() < 1e-5, "{lp} vs {expected}");
    }

    #[test]
    fn log_prob_rejects_wrong_action_dim() {
        let device = NdArrayDevice::default();
        let dist = DiagonalGaussian::<TestBackend>::new(
            Tensor::from_floats([0.0], &device),
            Tensor::from_floats([1.0], &device),
        )
        .unwrap();
        assert!(matches!(
            dist.log_prob(Tensor::from_floats([0.0, 0.0], &device)),
            Err(Error::ActionDim { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn entropy_matches_closed_form() {
        let device = NdArrayDevice::default();
        let dist = DiagonalGaussian::<TestBackend>::new(
            Tensor::from_floats([0.0, 0.0], &device),
            Tensor::from_floats([1.0, 1.0], &device),
        )
        .unwrap();

        let h = values(dist.entropy())[0];
        assert!((h - (1.0 + LN_2PI)).abs() < 1e-5);
    }

    #[test]
    fn samples_concentrate_on_mean_for_tiny_variance() {
        let device = NdArrayDevice::default();
        let dist = DiagonalGaussian::<TestBackend>::new(
            Tensor::from_floats([0.25, -0.75], &device),
            Tensor::from_floats([MIN_VARIANCE, MIN_VARIANCE], &device),
        )
        .unwrap();

        let sample = values(dist.sample());
        assert!((sample[0] - 0.25).abs() < 1e-2);
        assert!((sample[1] + 0.75).abs() < 1e-2);
    }

    #[test]
    fn log_prob_is_differentiable_wrt_network_outputs() {
        let device = NdArrayDevice::default();
        let mean_raw = Tensor::<TestAutodiffBackend, 2>::from_floats([[0.3, -0.2]], &device).require_grad();
        let spread_raw = Tensor::<TestAutodiffBackend, 2>::from_floats([[0.1, 0.4]], &device).require_grad();
        let value = Tensor::<TestAutodiffBackend, 2>::from_floats([[0.0]], &device);

        let out = gaussian_policy(mean_raw.clone(), spread_raw.clone(), value).unwrap();
        let action = out.distribution.sample();
        let grads = out.distribution.log_prob(action).unwrap().backward();

        assert!(mean_raw.grad(&grads).is_some());
        assert!(spread_raw.grad(&grads).is_some());
    }
}
