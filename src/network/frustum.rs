//! Time- and view-conditioned 3D U-Net over frustum volumes.

pub use super::*;

use burn::nn::{
    conv::{Conv3d, Conv3dConfig, ConvTranspose3d},
    PaddingConfig3d,
};
use std::collections::BTreeMap;

/// Frustum features of a batch keyed by their width.
///
/// The keys are `W`, `W / 2`, `W / 4` and `W / 8`,
/// and each value is `[B, C_level, D_level, H_level, W_level]`.
pub type FeaturePyramid<B> = BTreeMap<usize, Tensor<B, 5>>;

/// The configuration for [`FrustumVolumeNet3d`].
#[derive(Config, Debug)]
pub struct FrustumVolumeNet3dConfig {
    /// Input channels, i.e., the channels of the spatial volume.
    #[config(default = "VOLUME_DIMS[0]")]
    pub dim_input: usize,
    /// Timestep embedding dimension.
    #[config(default = "TIME_EMBED_DIM")]
    pub dim_time: usize,
    /// Viewpoint embedding dimension.
    #[config(default = "VIEWPOINT_DIM")]
    pub dim_view: usize,
    /// Channels from the finest to the coarsest level.
    #[config(default = "VOLUME_DIMS")]
    pub dims: [usize; 4],
}

/// Blocks of a downsampling level.
#[derive(Debug, Module)]
pub struct FrustumLevel<B: Backend> {
    /// Halving every side.
    pub down: ConditionalBlock<B, Conv3d<B>>,
    pub block: ConditionalBlock<B, Conv3d<B>>,
}

/// A 3D U-Net conditioned on the timestep and the viewpoint,
/// keeping the output of every level.
#[derive(Debug, Module)]
pub struct FrustumVolumeNet3d<B: Backend> {
    pub conv_input: Conv3d<B>,
    /// From the finest to the coarsest level.
    pub levels: Vec<FrustumLevel<B>>,
    /// From the coarsest to the finest level.
    pub ups: Vec<ConditionalBlock<B, ConvTranspose3d<B>>>,
}

impl FrustumVolumeNet3dConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> FrustumVolumeNet3d<B> {
        let dims = self.dims;
        let block = |dim_input: usize, dim_output: usize| {
            ConditionalBlockConfig::new(dim_input, dim_output)
                .with_dim_time(Some(self.dim_time))
                .with_dim_view(Some(self.dim_view))
        };

        let conv_input = Conv3dConfig::new([self.dim_input, dims[0]], [3, 3, 3])
            .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
            .init(device);
        let levels = dims
            .windows(2)
            .map(|dims| FrustumLevel {
                down: block(dims[0], dims[1]).with_stride(2).init_3d(device),
                block: block(dims[1], dims[1]).init_3d(device),
            })
            .collect();
        let ups = dims
            .windows(2)
            .rev()
            .map(|dims| block(dims[1], dims[0]).init_3d_up(device))
            .collect();

        FrustumVolumeNet3d {
            conv_input,
            levels,
            ups,
        }
    }
}

impl<B: Backend> FrustumVolumeNet3d<B> {
    /// ## Shapes
    ///
    /// * `input` - `[B, dim_input, D, H, W]`
    /// * `condition.time` - `[B, dim_time]`
    /// * `condition.view` - `[B, dim_view]`
    /// * `output[W / 2^i]` - `[B, dims[i], D / 2^i, H / 2^i, W / 2^i]`
    ///
    /// ## Details
    ///
    /// Every side of the input should be divisible by 8.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
        condition: &Condition<B>,
    ) -> FeaturePyramid<B> {
        let mut hidden = self.conv_input.forward(input);
        let mut skips = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            skips.push(hidden.to_owned());
            hidden = level.down.forward(hidden, condition);
            hidden = level.block.forward(hidden, condition);
        }

        let mut pyramid = FeaturePyramid::new();
        for (up, skip) in self.ups.iter().zip(skips.into_iter().rev()) {
            let coarse = hidden;
            hidden = up.forward(coarse.to_owned(), condition) + skip;
            pyramid.insert(coarse.dims()[4], coarse);
        }
        pyramid.insert(hidden.dims()[4], hidden);

        pyramid
    }
}

impl Default for FrustumVolumeNet3dConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type B = NdArray<f32>;

    #[test]
    fn forward_returns_every_level() {
        let device = &Default::default();

        let net = FrustumVolumeNet3dConfig::new()
            .with_dim_input(8)
            .with_dim_time(6)
            .with_dims([8, 8, 16, 16])
            .init::<B>(device);
        let condition = Condition::new(Tensor::<B, 2>::ones([3, 6], device))
            .with_view(Tensor::ones([3, VIEWPOINT_DIM], device));
        let pyramid = net.forward(
            Tensor::random([3, 8, 16, 8, 8], Distribution::Default, device),
            &condition,
        );

        assert_eq!(pyramid.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4, 8]);
        assert_eq!(pyramid[&8].dims(), [3, 8, 16, 8, 8]);
        assert_eq!(pyramid[&4].dims(), [3, 8, 8, 4, 4]);
        assert_eq!(pyramid[&2].dims(), [3, 16, 4, 2, 2]);
        assert_eq!(pyramid[&1].dims(), [3, 16, 2, 1, 1]);
    }
}
