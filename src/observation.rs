//! Observations produced by environments
//!
//! An observation is either a flat feature vector or an image. Images carry an
//! explicit memory layout: environments render channels-last (`H × W × C`),
//! the convolutional network consumes channels-first (`C × H × W`).

use crate::error::{Error, Result};

/// Memory layout of an [`Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// `[height, width, channels]`, as rendered by environments
    ChannelsLast,
    /// `[channels, height, width]`, as consumed by convolutions
    ChannelsFirst,
}

/// A dense row-major image
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    layout: ImageLayout,
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Image {
    /// Build a channels-last image from `height * width * channels` values
    pub fn channels_last(height: usize, width: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        Self::new(ImageLayout::ChannelsLast, channels, height, width, data)
    }

    /// Build a channels-first image from `channels * height * width` values
    pub fn channels_first(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        Self::new(ImageLayout::ChannelsFirst, channels, height, width, data)
    }

    fn new(
        layout: ImageLayout,
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = channels * height * width;
        if data.len() != expected {
            let shape = match layout {
                ImageLayout::ChannelsLast => vec![height, width, channels],
                ImageLayout::ChannelsFirst => vec![channels, height, width],
            };
            return Err(Error::ObservationShape {
                shape,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            layout,
            channels,
            height,
            width,
            data,
        })
    }

    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Shape in storage order
    pub fn shape(&self) -> [usize; 3] {
        match self.layout {
            ImageLayout::ChannelsLast => [self.height, self.width, self.channels],
            ImageLayout::ChannelsFirst => [self.channels, self.height, self.width],
        }
    }

    /// Value at channel `c`, row `y`, column `x`, whatever the layout
    pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[self.offset(c, y, x)]
    }

    fn offset(&self, c: usize, y: usize, x: usize) -> usize {
        match self.layout {
            ImageLayout::ChannelsLast => (y * self.width + x) * self.channels + c,
            ImageLayout::ChannelsFirst => (c * self.height + y) * self.width + x,
        }
    }

    /// Transpose into channels-first layout
    pub fn into_channels_first(self) -> Self {
        if self.layout == ImageLayout::ChannelsFirst {
            return self;
        }

        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.channels {
            for y in 0..self.height {
                for x in 0..self.width {
                    data.push(self.get(c, y, x));
                }
            }
        }

        Self {
            layout: ImageLayout::ChannelsFirst,
            data,
            ..self
        }
    }

    /// Nearest-neighbour resize, keeping the layout
    pub fn resize(self, height: usize, width: usize) -> Self {
        if self.height == height && self.width == width {
            return self;
        }

        let mut resized = Self {
            data: vec![0.0; self.channels * height * width],
            height,
            width,
            ..self.clone()
        };
        for c in 0..self.channels {
            for y in 0..height {
                let src_y = y * self.height / height;
                for x in 0..width {
                    let src_x = x * self.width / width;
                    let dst = resized.offset(c, y, x);
                    resized.data[dst] = self.get(c, src_y, src_x);
                }
            }
        }
        resized
    }
}

/// A single environment observation
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Vector(Vec<f32>),
    Image(Image),
}

impl Observation {
    /// Shape in storage order
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Observation::Vector(v) => vec![v.len()],
            Observation::Image(image) => image.shape().to_vec(),
        }
    }

    /// Number of dimensions, without any batch dimension
    pub fn rank(&self) -> usize {
        match self {
            Observation::Vector(_) => 1,
            Observation::Image(_) => 3,
        }
    }

    /// Flat values in storage order
    pub fn values(&self) -> &[f32] {
        match self {
            Observation::Vector(v) => v,
            Observation::Image(image) => image.data(),
        }
    }
}

impl From<Vec<f32>> for Observation {
    fn from(values: Vec<f32>) -> Self {
        Observation::Vector(values)
    }
}

impl From<Image> for Observation {
    fn from(image: Image) -> Self {
        Observation::Image(image)
    }
}
