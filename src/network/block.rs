//! Conditional convolution block.
//!
//! One block serves the 2D and 3D networks, strided or transposed.
//! The conditioning vectors are projected to the channel count, broadcast to
//! every location and added to the input, so the channel counts never change.

pub use super::*;

use burn::{
    module::Module,
    nn::{
        conv::{
            Conv2d, Conv2dConfig, Conv3d, Conv3dConfig, ConvTranspose3d,
            ConvTranspose3dConfig,
        },
        GroupNorm, GroupNormConfig, Linear, LinearConfig, PaddingConfig2d,
        PaddingConfig3d,
    },
    tensor::activation,
};

/// A convolution over the trailing `D - 2` dimensions of `[B, C, ...]`.
pub trait SpatialConvolution<B: Backend, const D: usize>: Module<B> {
    fn convolve(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D>;
}

impl<B: Backend> SpatialConvolution<B, 4> for Conv2d<B> {
    #[inline]
    fn convolve(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.forward(input)
    }
}

impl<B: Backend> SpatialConvolution<B, 5> for Conv3d<B> {
    #[inline]
    fn convolve(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        self.forward(input)
    }
}

impl<B: Backend> SpatialConvolution<B, 5> for ConvTranspose3d<B> {
    #[inline]
    fn convolve(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        self.forward(input)
    }
}

/// Conditioning vectors of a batch.
#[derive(Clone, Debug)]
pub struct Condition<B: Backend> {
    /// Timestep embedding, `[B, T]`.
    pub time: Tensor<B, 2>,
    /// Viewpoint embedding, `[B, V]`.
    pub view: Option<Tensor<B, 2>>,
}

impl<B: Backend> Condition<B> {
    #[inline]
    pub fn new(time: Tensor<B, 2>) -> Self {
        Self { time, view: None }
    }

    #[inline]
    pub fn with_view(
        mut self,
        view: Tensor<B, 2>,
    ) -> Self {
        self.view = Some(view);
        self
    }
}

/// Additive projections of the conditioning vectors.
#[derive(Debug, Module)]
pub struct Conditioning<B: Backend> {
    /// `T -> C`
    pub time: Option<Linear<B>>,
    /// `V -> C`
    pub view: Option<Linear<B>>,
}

impl<B: Backend> Conditioning<B> {
    /// Adding the projected conditions to every location of `input`.
    ///
    /// ## Shapes
    ///
    /// * `input` - `[B, C, ...]`
    /// * `output` - `[B, C, ...]`
    ///
    /// # Panics
    ///
    /// If the block projects viewpoints but `condition` carries none.
    pub fn forward<const D: usize>(
        &self,
        mut input: Tensor<B, D>,
        condition: &Condition<B>,
    ) -> Tensor<B, D> {
        if let Some(time) = &self.time {
            input = input + Self::broadcast(time.forward(condition.time.to_owned()));
        }
        if let Some(view) = &self.view {
            let embedding = condition
                .view
                .to_owned()
                .expect("The viewpoint embedding should be given");
            input = input + Self::broadcast(view.forward(embedding));
        }
        input
    }

    /// `[B, C] -> [B, C, 1, ...]`
    fn broadcast<const D: usize>(projected: Tensor<B, 2>) -> Tensor<B, D> {
        let [b, c] = projected.dims();
        let mut shape = [1; D];
        shape[0] = b;
        shape[1] = c;
        projected.reshape(shape)
    }
}

/// The configuration for [`ConditionalBlock`].
#[derive(Config, Copy, Debug)]
pub struct ConditionalBlockConfig {
    /// Input channels.
    pub dim_input: usize,
    /// Output channels.
    pub dim_output: usize,
    /// Timestep embedding dimension.
    #[config(default = "None")]
    pub dim_time: Option<usize>,
    /// Viewpoint embedding dimension.
    #[config(default = "None")]
    pub dim_view: Option<usize>,
    /// Convolution stride.
    ///
    /// Transposed convolutions always upsample by 2.
    #[config(default = 1)]
    pub stride: usize,
}

/// `conv(SiLU(norm(input + time + view)))`
#[derive(Debug, Module)]
pub struct ConditionalBlock<B: Backend, C> {
    pub conditioning: Conditioning<B>,
    pub norm: GroupNorm<B>,
    pub conv: C,
}

impl ConditionalBlockConfig {
    /// Initialize with a 3x3 convolution.
    pub fn init_2d<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConditionalBlock<B, Conv2d<B>> {
        let conv = Conv2dConfig::new([self.dim_input, self.dim_output], [3, 3])
            .with_stride([self.stride; 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        self.init_with(conv, device)
    }

    /// Initialize with a 3x3x3 convolution.
    pub fn init_3d<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConditionalBlock<B, Conv3d<B>> {
        let conv = Conv3dConfig::new([self.dim_input, self.dim_output], [3, 3, 3])
            .with_stride([self.stride; 3])
            .with_padding(PaddingConfig3d::Explicit(1, 1, 1))
            .init(device);
        self.init_with(conv, device)
    }

    /// Initialize with a 3x3x3 transposed convolution doubling every side.
    pub fn init_3d_up<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConditionalBlock<B, ConvTranspose3d<B>> {
        let conv =
            ConvTranspose3dConfig::new([self.dim_input, self.dim_output], [3, 3, 3])
                .with_stride([2; 3])
                .with_padding([1; 3])
                .with_padding_out([1; 3])
                .init(device);
        self.init_with(conv, device)
    }

    fn init_with<B: Backend, C>(
        &self,
        conv: C,
        device: &B::Device,
    ) -> ConditionalBlock<B, C> {
        let projection = |dim: usize| LinearConfig::new(dim, self.dim_input).init(device);
        let conditioning = Conditioning {
            time: self.dim_time.map(projection),
            view: self.dim_view.map(projection),
        };
        let norm = GroupNormConfig::new(NORM_GROUP_COUNT, self.dim_input).init(device);

        ConditionalBlock {
            conditioning,
            norm,
            conv,
        }
    }
}

impl<B: Backend, C> ConditionalBlock<B, C> {
    /// ## Shapes
    ///
    /// * `input` - `[B, C_in, ...]`
    /// * `output` - `[B, C_out, ...]`, resized by the convolution
    pub fn forward<const D: usize>(
        &self,
        mut input: Tensor<B, D>,
        condition: &Condition<B>,
    ) -> Tensor<B, D>
    where
        C: SpatialConvolution<B, D>,
    {
        input = self.conditioning.forward(input, condition);
        input = self.norm.forward(input);
        input = activation::silu(input);
        self.conv.convolve(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn block_shapes() {
        let device = &Default::default();
        let condition = Condition::new(Tensor::<B, 2>::ones([2, 5], device))
            .with_view(Tensor::ones([2, 4], device));

        let block = ConditionalBlockConfig::new(8, 16)
            .with_dim_time(Some(5))
            .with_dim_view(Some(4))
            .init_2d::<B>(device);
        let output = block.forward(Tensor::<B, 4>::zeros([2, 8, 6, 6], device), &condition);
        assert_eq!(output.dims(), [2, 16, 6, 6]);

        let block = ConditionalBlockConfig::new(8, 16)
            .with_dim_time(Some(5))
            .with_stride(2)
            .init_3d::<B>(device);
        let output =
            block.forward(Tensor::<B, 5>::zeros([2, 8, 4, 6, 8], device), &condition);
        assert_eq!(output.dims(), [2, 16, 2, 3, 4]);

        let block = ConditionalBlockConfig::new(16, 8)
            .with_dim_time(Some(5))
            .with_dim_view(Some(4))
            .init_3d_up::<B>(device);
        let output =
            block.forward(Tensor::<B, 5>::zeros([2, 16, 2, 3, 4], device), &condition);
        assert_eq!(output.dims(), [2, 8, 4, 6, 8]);
    }

    #[test]
    fn conditioning_is_broadcast_per_batch() {
        let device = &Default::default();

        let conditioning = Conditioning::<B> {
            time: Some(LinearConfig::new(2, 3).with_bias(false).init(device)),
            view: None,
        };
        let weight = conditioning.time.as_ref().unwrap().weight.val();
        let condition = Condition::new(Tensor::<B, 2>::from_floats(
            [[1.0, 0.0], [0.0, 1.0]],
            device,
        ));
        let output =
            conditioning.forward(Tensor::<B, 4>::zeros([2, 3, 2, 2], device), &condition);

        // Every location of a batch element carries the same projected vector
        let target = weight.reshape([2, 3, 1, 1]).repeat_dim(2, 2).repeat_dim(3, 2);
        output.into_data().assert_eq(&target.into_data(), true);
    }

    #[test]
    #[should_panic(expected = "The viewpoint embedding should be given")]
    fn conditioning_without_viewpoint() {
        let device = &Default::default();

        let block = ConditionalBlockConfig::new(8, 8)
            .with_dim_view(Some(4))
            .init_2d::<B>(device);
        let condition = Condition::new(Tensor::<B, 2>::ones([1, 5], device));
        block.forward(Tensor::<B, 4>::zeros([1, 8, 2, 2], device), &condition);
    }
}
