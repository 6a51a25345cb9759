//! Timestep and image embeddings.

pub use super::*;
pub use burn::{
    module::Param,
    nn::{Linear, LinearConfig},
    tensor::Int,
};

use burn::tensor::activation;

/// Maximum period of the sinusoidal timestep embedding.
pub const TIME_MAX_PERIOD: f64 = 10000.0;

/// The configuration for [`TimeEmbedding`].
#[derive(Config, Copy, Debug)]
pub struct TimeEmbeddingConfig {
    /// Embedding dimension.
    #[config(default = "TIME_EMBED_DIM")]
    pub dim: usize,
}

/// Embedding timesteps with sinusoids and two linear layers.
///
/// `W_2 * SiLU(W_1 * sinusoids(t) + B_1) + B_2`
#[derive(Debug, Module)]
pub struct TimeEmbedding<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
}

impl TimeEmbeddingConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> TimeEmbedding<B> {
        let fc1 = LinearConfig::new(self.dim, self.dim).init(device);
        let fc2 = LinearConfig::new(self.dim, self.dim).init(device);
        TimeEmbedding { fc1, fc2 }
    }
}

impl<B: Backend> TimeEmbedding<B> {
    /// ## Shapes
    ///
    /// * `timesteps` - `[B]`
    /// * `output` - `[B, dim]`
    pub fn forward(
        &self,
        timesteps: Tensor<B, 1, Int>,
    ) -> Tensor<B, 2> {
        let [dim, _] = self.fc1.weight.val().dims();
        let mut output = sinusoidal_embedding(timesteps, dim);
        output = self.fc1.forward(output);
        output = activation::silu(output);
        output = self.fc2.forward(output);
        output
    }
}

/// Sinusoidal embedding of timesteps.
///
/// ## Shapes
///
/// * `timesteps` - `[B]`
/// * `output` - `[B, dim]`
///
/// ## Details
///
/// The output is `cos(t * f_i) ‖ sin(t * f_i)`, where
/// `f_i = TIME_MAX_PERIOD ^ (-i / (dim / 2))`.
/// An odd `dim` is padded with a zero column.
pub fn sinusoidal_embedding<B: Backend>(
    timesteps: Tensor<B, 1, Int>,
    dim: usize,
) -> Tensor<B, 2> {
    let device = timesteps.device();
    let [b] = timesteps.dims();
    let half = dim / 2;

    // [1, dim / 2]
    let frequencies = Tensor::<B, 1, Int>::arange(0..half as i64, &device)
        .float()
        .mul_scalar(-TIME_MAX_PERIOD.ln() / half as f64)
        .exp()
        .reshape([1, half]);
    // [B, dim / 2]
    let arguments = timesteps.float().reshape([b, 1]).mul(frequencies);

    let mut parts = vec![arguments.to_owned().cos(), arguments.sin()];
    if dim % 2 == 1 {
        parts.push(Tensor::zeros([b, 1], &device));
    }
    Tensor::cat(parts, 1)
}

/// The configuration for [`ClipProjection`].
#[derive(Config, Copy, Debug)]
pub struct ClipProjectionConfig {
    /// Image embedding dimension.
    #[config(default = "CLIP_EMBED_DIM")]
    pub dim_clip: usize,
    /// Viewpoint embedding dimension.
    #[config(default = "VIEWPOINT_DIM")]
    pub dim_view: usize,
}

/// Projecting an image embedding concatenated with a viewpoint embedding
/// back to the image embedding dimension.
#[derive(Debug, Module)]
pub struct ClipProjection<B: Backend> {
    pub linear: Linear<B>,
}

impl ClipProjectionConfig {
    /// Initialize from the configuration.
    ///
    /// ## Details
    ///
    /// The projection starts as the identity on the image embedding,
    /// ignoring the viewpoint.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ClipProjection<B> {
        let dim_input = self.dim_clip + self.dim_view;
        let dim_output = self.dim_clip;
        let mut linear = LinearConfig::new(dim_input, dim_output).init(device);

        // [dim_input, dim_output]
        let weight = {
            let mut weight = vec![0.0_f32; dim_input * dim_output];
            (0..dim_output).for_each(|i| weight[i * dim_output + i] = 1.0);
            Tensor::from_data(
                TensorData::new(weight, [dim_input, dim_output])
                    .convert::<B::FloatElem>(),
                device,
            )
        };
        let bias = Tensor::zeros([dim_output], device);

        linear.weight = Param::initialized(linear.weight.id.to_owned(), weight);
        linear.bias = linear
            .bias
            .map(|param| Param::initialized(param.id.to_owned(), bias));

        ClipProjection { linear }
    }
}

impl<B: Backend> ClipProjection<B> {
    /// ## Shapes
    ///
    /// * `clip` - `[B, 1, dim_clip]`
    /// * `view` - `[B, dim_view]`
    /// * `output` - `[B, 1, dim_clip]`
    pub fn forward(
        &self,
        clip: Tensor<B, 3>,
        view: Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let input = Tensor::cat(vec![clip, view.unsqueeze_dim(1)], 2);
        self.linear.forward(input)
    }
}

impl Default for TimeEmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ClipProjectionConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
