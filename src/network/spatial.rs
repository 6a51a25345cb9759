//! Time-conditioned 3D U-Net over the spatial volume.

pub use super::*;

use burn::nn::{
    conv::{Conv3d, Conv3dConfig, ConvTranspose3d},
    PaddingConfig3d,
};

/// The configuration for [`SpatialVolumeNet3d`].
#[derive(Config, Debug)]
pub struct SpatialVolumeNet3dConfig {
    /// Input channels, i.e., the feature channels of all views.
    pub dim_input: usize,
    /// Timestep embedding dimension.
    #[config(default = "TIME_EMBED_DIM")]
    pub dim_time: usize,
    /// Channels from the finest to the coarsest level.
    #[config(default = "VOLUME_DIMS")]
    pub dims: [usize; 4],
}

/// Blocks of a downsampling level.
#[derive(Debug, Module)]
pub struct SpatialLevel<B: Backend> {
    /// Halving every side.
    pub down: ConditionalBlock<B, Conv3d<B>>,
    pub blocks: Vec<ConditionalBlock<B, Conv3d<B>>>,
}

/// A 3D U-Net conditioned on the timestep only.
///
/// Every side of the input should be divisible by 8.
/// The output has the channels of the finest level and the input size.
#[derive(Debug, Module)]
pub struct SpatialVolumeNet3d<B: Backend> {
    pub conv_input: Conv3d<B>,
    pub block_input: ConditionalBlock<B, Conv3d<B>>,
    /// From the finest to the coarsest level.
    pub levels: Vec<SpatialLevel<B>>,
    /// From the coarsest to the finest level.
    pub ups: Vec<ConditionalBlock<B, ConvTranspose3d<B>>>,
}

impl SpatialVolumeNet3dConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SpatialVolumeNet3d<B> {
        let dims = self.dims;
        let block = |dim_input: usize, dim_output: usize| {
            ConditionalBlockConfig::new(dim_input, dim_output)
                .with_dim_time(Some(self.dim_time))
        };

        let conv_input = Conv3dConfig::new([self.dim_input, dims[0]], [3, 3, 3])
            .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
            .init(device);
        let block_input = block(dims[0], dims[0]).init_3d(device);
        let levels = dims
            .windows(2)
            .map(|dims| SpatialLevel {
                down: block(dims[0], dims[1]).with_stride(2).init_3d(device),
                blocks: (0..2).map(|_| block(dims[1], dims[1]).init_3d(device)).collect(),
            })
            .collect();
        let ups = dims
            .windows(2)
            .rev()
            .map(|dims| block(dims[1], dims[0]).init_3d_up(device))
            .collect();

        SpatialVolumeNet3d {
            conv_input,
            block_input,
            levels,
            ups,
        }
    }
}

impl<B: Backend> SpatialVolumeNet3d<B> {
    /// ## Shapes
    ///
    /// * `input` - `[B, dim_input, V, V, V]`
    /// * `time` - `[B, dim_time]`
    /// * `output` - `[B, dims[0], V, V, V]`
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
        time: Tensor<B, 2>,
    ) -> Tensor<B, 5> {
        let condition = Condition::new(time);

        let mut hidden = self.conv_input.forward(input);
        hidden = self.block_input.forward(hidden, &condition);

        let mut skips = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            skips.push(hidden.to_owned());
            hidden = level.down.forward(hidden, &condition);
            for block in &level.blocks {
                hidden = block.forward(hidden, &condition);
            }
        }

        for (up, skip) in self.ups.iter().zip(skips.into_iter().rev()) {
            hidden = skip + up.forward(hidden, &condition);
        }
        hidden
    }
}
