//! Compute context
//!
//! The backend is chosen at compile time through the `B` type parameter; the
//! context carries the device value explicitly into model construction and
//! the agent instead of relying on a process-wide default.

use burn::tensor::backend::Backend;

/// Device a run computes on
#[derive(Debug, Clone)]
pub struct ComputeContext<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ComputeContext<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Seed the backend's random number generator and build the context
    pub fn seeded(device: B::Device, seed: u64) -> Self {
        B::seed(seed);
        Self::new(device)
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: Backend> Default for ComputeContext<B> {
    fn default() -> Self {
        Self::new(B::Device::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::Tensor;

    #[test]
    fn tensors_land_on_context_device() {
        let ctx = ComputeContext::<NdArray>::seeded(NdArrayDevice::default(), 9);
        let t = Tensor::<NdArray, 1>::zeros([4], ctx.device());
        assert_eq!(t.device(), *ctx.device());
    }
}
