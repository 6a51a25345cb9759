//! Collaborators outside of the volume conditioning.

pub use super::*;

/// Conditioning of the denoiser for a batch of target views.
///
/// `TN` targets are requested per batch element,
/// and the targets are ordered by batch element, then by target.
#[derive(Clone, Debug)]
pub struct TargetViewConditioning<B: Backend> {
    /// Projected image embeddings, `[B * TN, 1, 768]`.
    pub clip_embed: Tensor<B, 3>,
    /// Frustum features keyed by their width.
    pub volume_feats: FeaturePyramid<B>,
    /// Latents of the input image, `[B * TN, 4, h, w]`.
    pub x_concat: Tensor<B, 4>,
}

/// The denoising network predicting noise of target views.
pub trait Denoiser<B: Backend> {
    /// ## Shapes
    ///
    /// * `latents` - Noisy target latents, `[B * TN, 4, h, w]`
    /// * `timesteps` - `[B * TN]`
    /// * `output` - Predicted noise, `[B * TN, 4, h, w]`
    fn denoise(
        &self,
        latents: Tensor<B, 4>,
        timesteps: Tensor<B, 1, Int>,
        conditioning: &TargetViewConditioning<B>,
    ) -> Tensor<B, 4>;
}

/// The image autoencoder.
pub trait LatentCodec<B: Backend> {
    /// `[B, 3, H, W] -> [B, 4, H / 8, W / 8]`
    fn encode(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4>;

    /// `[B, 4, H / 8, W / 8] -> [B, 3, H, W]`
    fn decode(
        &self,
        latents: Tensor<B, 4>,
    ) -> Tensor<B, 4>;

    /// Encoding into the scaled latent space.
    #[inline]
    fn scaled_encode(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.encode(images).mul_scalar(LATENT_SCALE)
    }

    /// Decoding from the scaled latent space.
    #[inline]
    fn scaled_decode(
        &self,
        latents: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.decode(latents.div_scalar(LATENT_SCALE))
    }

    /// Encoding every view into the scaled latent space.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[B, N, 3, H, W]`
    /// * `output` - `[B, N, 4, H / 8, W / 8]`
    fn scaled_encode_views(
        &self,
        images: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let [b, n, c, h, w] = images.dims();
        let latents = self.scaled_encode(images.reshape([b * n, c, h, w]));
        let [_, c, h, w] = latents.dims();
        latents.reshape([b, n, c, h, w])
    }
}
