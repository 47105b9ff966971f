use burn::{
    prelude::*,
    tensor::{backend::Backend, BasicOps, TensorData},
};

use crate::observation::Observation;

/// A trait for converting items to tensors
///
/// Implemented for observations (batched into a single-item batch) and for
/// plain `Vec<f32>` buffers such as returns and actions.
pub trait ToTensor<B: Backend, const D: usize, K: BasicOps<B>> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, D, K>;
}

impl<B: Backend> ToTensor<B, 1, Float> for Vec<f32> {
    #[inline]
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 1> {
        let len = self.len();
        Tensor::from_data(TensorData::new(self, [len]).convert::<B::FloatElem>(), device)
    }
}

/// Observation → `[1, ...shape]`
///
/// `D` must be the observation rank plus one; callers check
/// [`Observation::rank`] before converting.
impl<B: Backend, const D: usize> ToTensor<B, D, Float> for &Observation {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, D> {
        let mut shape = Vec::with_capacity(D);
        shape.push(1);
        shape.extend(self.shape());

        let data = TensorData::new(self.values().to_vec(), shape);
        Tensor::from_data(data.convert::<B::FloatElem>(), device)
    }
}
