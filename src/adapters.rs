//! Glue between raw environment data and the network
//!
//! [`preprocess`] brings observations into the canonical form the network is
//! built for, [`postprocess_action`] turns a sampled action into something the
//! environment accepts. Batching into tensors lives in
//! [`ToTensor`](crate::traits::ToTensor).

use crate::observation::{Image, Observation};

/// Default spatial resolution of image observations fed to the network
pub const DEFAULT_IMAGE_SIZE: usize = 84;

/// Added to the third action component after clamping so it is never exactly zero
pub const GAS_EPSILON: f32 = 1e-4;

/// Canonicalise an observation for the network.
///
/// Vectors pass through untouched. Images are transposed to channels-first
/// and resized to `image_size × image_size`. Applying this twice yields the
/// same observation as applying it once.
pub fn preprocess(observation: &Observation, image_size: usize) -> Observation {
    match observation {
        Observation::Vector(values) => Observation::Vector(values.clone()),
        Observation::Image(image) => Observation::Image(canonical_image(image.clone(), image_size)),
    }
}

fn canonical_image(image: Image, image_size: usize) -> Image {
    image.into_channels_first().resize(image_size, image_size)
}

/// Make a sampled action acceptable to the environment.
///
/// The second component is clamped to `[0, 1]`, the third to `[0, 1]` and then
/// nudged up by [`GAS_EPSILON`]. The first component is left as sampled.
pub fn postprocess_action(mut action: Vec<f32>) -> Vec<f32> {
    if let Some(brake) = action.get_mut(1) {
        *brake = brake.clamp(0.0, 1.0);
    }
    if let Some(gas) = action.get_mut(2) {
        *gas = gas.clamp(0.0, 1.0) + GAS_EPSILON;
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ImageLayout;

    fn frame(height: usize, width: usize) -> Image {
        let data = (0..height * width * 3).map(|i| (i % 251) as f32).collect();
        Image::channels_last(height, width, 3, data).unwrap()
    }

    #[test]
    fn postprocess_clamps_brake_and_gas() {
        let action = postprocess_action(vec![0.5, -0.2, 1.5]);
        assert_eq!(action, vec![0.5, 0.0, 1.0 + 1e-4]);
    }

    #[test]
    fn postprocess_leaves_steering_alone() {
        assert_eq!(postprocess_action(vec![-3.0]), vec![-3.0]);
        assert_eq!(postprocess_action(vec![1.7, 0.3]), vec![1.7, 0.3]);
    }

    #[test]
    fn postprocess_gas_never_zero() {
        let action = postprocess_action(vec![0.0, 0.0, -5.0]);
        assert!(action[2] > 0.0);
    }

    #[test]
    fn preprocess_passes_vectors_through() {
        let obs = Observation::Vector(vec![0.1, -0.2, 3.0]);
        assert_eq!(preprocess(&obs, DEFAULT_IMAGE_SIZE), obs);
    }

    #[test]
    fn preprocess_images_to_channels_first() {
        let obs = Observation::Image(frame(96, 96));
        let Observation::Image(out) = preprocess(&obs, DEFAULT_IMAGE_SIZE) else {
            panic!("image stays an image");
        };
        assert_eq!(out.layout(), ImageLayout::ChannelsFirst);
        assert_eq!(out.shape(), [3, 84, 84]);
    }

    #[test]
    fn preprocess_is_idempotent_on_canonical_frames() {
        let obs = Observation::Image(frame(84, 84));
        let once = preprocess(&obs, DEFAULT_IMAGE_SIZE);
        let twice = preprocess(&once, DEFAULT_IMAGE_SIZE);
        assert_eq!(once, twice);
    }

    #[test]
    fn preprocess_keeps_pixels_at_native_size() {
        let image = frame(84, 84);
        let Observation::Image(out) = preprocess(&Observation::Image(image.clone()), 84) else {
            panic!("image stays an image");
        };
        assert_eq!(out.get(2, 10, 20), image.get(2, 10, 20));
    }
}
