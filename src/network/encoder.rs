//! Encoding noisy latents of each view.

pub use super::*;

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    PaddingConfig2d,
};

/// The configuration for [`NoisyViewEncoder`].
#[derive(Config, Copy, Debug)]
pub struct NoisyViewEncoderConfig {
    /// Latent channels.
    #[config(default = "LATENT_CHANNELS")]
    pub dim_input: usize,
    /// Channels of the residual blocks.
    #[config(default = 16)]
    pub dim_hidden: usize,
    /// Feature channels.
    #[config(default = 16)]
    pub dim_output: usize,
    /// Timestep embedding dimension.
    #[config(default = "TIME_EMBED_DIM")]
    pub dim_time: usize,
    /// Viewpoint embedding dimension.
    #[config(default = "VIEWPOINT_DIM")]
    pub dim_view: usize,
    /// Number of residual blocks.
    #[config(default = 3)]
    pub residual_count: usize,
}

/// `input + block_2(block_1(input, time, view))`
#[derive(Debug, Module)]
pub struct ConditionalResidual<B: Backend> {
    pub block_1: ConditionalBlock<B, Conv2d<B>>,
    pub block_2: ConditionalBlock<B, Conv2d<B>>,
}

/// Encoding a noisy latent image into a feature map of the same size,
/// conditioned on the timestep and the viewpoint.
#[derive(Debug, Module)]
pub struct NoisyViewEncoder<B: Backend> {
    pub conv_input: Conv2d<B>,
    pub residuals: Vec<ConditionalResidual<B>>,
    pub output: ConditionalBlock<B, Conv2d<B>>,
}

impl NoisyViewEncoderConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> NoisyViewEncoder<B> {
        let dim = self.dim_hidden;
        let conv_input = Conv2dConfig::new([self.dim_input, dim], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let residuals = (0..self.residual_count)
            .map(|_| ConditionalResidual {
                block_1: ConditionalBlockConfig::new(dim, dim)
                    .with_dim_time(Some(self.dim_time))
                    .with_dim_view(Some(self.dim_view))
                    .init_2d(device),
                block_2: ConditionalBlockConfig::new(dim, dim).init_2d(device),
            })
            .collect();
        let output = ConditionalBlockConfig::new(dim, self.dim_output).init_2d(device);

        NoisyViewEncoder {
            conv_input,
            residuals,
            output,
        }
    }
}

impl<B: Backend> NoisyViewEncoder<B> {
    /// ## Shapes
    ///
    /// * `input` - `[B, dim_input, H, W]`
    /// * `condition.time` - `[B, dim_time]`
    /// * `condition.view` - `[B, dim_view]`
    /// * `output` - `[B, dim_output, H, W]`
    pub fn forward(
        &self,
        mut input: Tensor<B, 4>,
        condition: &Condition<B>,
    ) -> Tensor<B, 4> {
        input = self.conv_input.forward(input);
        for residual in &self.residuals {
            let hidden = residual.block_1.forward(input.to_owned(), condition);
            input = input + residual.block_2.forward(hidden, condition);
        }
        self.output.forward(input, condition)
    }
}

impl Default for NoisyViewEncoderConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
