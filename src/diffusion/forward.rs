//! Conditioning and noise prediction passes.

pub use super::*;

use rand::Rng;

impl<B: Backend> MultiviewDiffusion<B> {
    /// ## Shapes
    ///
    /// * `timesteps` - `[B]`
    /// * `output` - `[B, T]`
    #[inline]
    pub fn embed_time(
        &self,
        timesteps: Tensor<B, 1, Int>,
    ) -> Tensor<B, 2> {
        self.net.time_embedding.forward(timesteps)
    }

    /// ## Shapes
    ///
    /// * `elevations_ref` - Elevations of the input images in radians, `[B]`
    /// * `output` - `[B, N, 4]`
    #[inline]
    pub fn embed_viewpoints(
        &self,
        elevations_ref: Tensor<B, 1>,
    ) -> Tensor<B, 3> {
        self.rig.viewpoint_embedding(elevations_ref)
    }

    /// ## Shapes
    ///
    /// * `latents` - Noisy latents of all views, `[B, N, 4, h, w]`
    /// * `time` - `[B, T]`
    /// * `views` - `[B, N, 4]`
    /// * `output` - `[B, dims[0], V, V, V]`
    #[inline]
    pub fn spatial_volume(
        &self,
        latents: Tensor<B, 5>,
        time: Tensor<B, 2>,
        views: Tensor<B, 3>,
    ) -> Tensor<B, 5> {
        self.net
            .spatial_volume
            .construct_spatial_volume(latents, time, views, &self.rig)
    }

    /// Conditioning the denoiser on the requested target views.
    ///
    /// ## Arguments
    ///
    /// * `latent_input` - Latents of the input images, `[B, 4, h, w]`.
    /// * `spatial` - Spatial volumes, `[B, C, V, V, V]`.
    /// * `clip` - Image embeddings of the input images, `[B, 1, 768]`.
    /// * `time` - Timestep embeddings, `[B, T]`.
    /// * `views` - Viewpoint embeddings, `[B, N, 4]`.
    /// * `target_indices` - `TN` view indices per batch element.
    pub fn target_view_conditioning(
        &self,
        latent_input: Tensor<B, 4>,
        spatial: Tensor<B, 5>,
        clip: Tensor<B, 3>,
        time: Tensor<B, 2>,
        views: Tensor<B, 3>,
        target_indices: &[Vec<usize>],
    ) -> TargetViewConditioning<B> {
        let device = latent_input.device();
        let [b, c, h, w] = latent_input.dims();
        let [_, n, dim_view] = views.dims();
        let [_, _, dim_clip] = clip.dims();
        let tn = target_indices.first().map(Vec::len).unwrap_or_default();
        let bt = b * tn;

        let (volume_feats, _) = self.net.spatial_volume.construct_frustum_volume(
            spatial,
            time,
            views.to_owned(),
            &self.rig,
            target_indices,
        );

        // [B * TN, 4]
        let views = views
            .reshape([b * n, dim_view])
            .select(0, flat_target_indices::<B>(target_indices, n, &device));
        // [B * TN, 1, 768]
        let clip = clip.unsqueeze_dim::<4>(1).repeat_dim(1, tn).reshape([bt, 1, dim_clip]);
        let clip_embed = self.net.clip_projection.forward(clip, views);

        // [B * TN, 4, h, w]
        let x_concat = latent_input
            .unsqueeze_dim::<5>(1)
            .repeat_dim(1, tn)
            .reshape([bt, c, h, w]);

        TargetViewConditioning {
            clip_embed,
            volume_feats,
            x_concat,
        }
    }

    /// Predicting the noise of the requested target views.
    ///
    /// ## Arguments
    ///
    /// * `denoiser` - The denoising network.
    /// * `latents` - Noisy latents of all views, `[B, N, 4, h, w]`.
    /// * `latent_input` - Latents of the input images, `[B, 4, h, w]`.
    /// * `clip` - Image embeddings of the input images, `[B, 1, 768]`.
    /// * `elevations_ref` - Elevations of the input images in radians, `[B]`.
    /// * `timesteps` - `[B]`.
    /// * `target_indices` - `TN` view indices per batch element.
    ///
    /// ## Shapes
    ///
    /// * `output` - `[B * TN, 4, h, w]`, ordered by batch element, then by target
    pub fn predict_noise<D: Denoiser<B>>(
        &self,
        denoiser: &D,
        latents: Tensor<B, 5>,
        latent_input: Tensor<B, 4>,
        clip: Tensor<B, 3>,
        elevations_ref: Tensor<B, 1>,
        timesteps: Tensor<B, 1, Int>,
        target_indices: &[Vec<usize>],
    ) -> Tensor<B, 4> {
        let device = latents.device();
        let [b, n, c, h, w] = latents.dims();
        let tn = target_indices.first().map(Vec::len).unwrap_or_default();

        #[cfg(debug_assertions)]
        log::debug!(
            target: "multiview_volume::diffusion",
            "predict_noise > batch ({b}) > targets ({tn})",
        );

        let time = self.embed_time(timesteps.to_owned());
        let views = self.embed_viewpoints(elevations_ref);
        let spatial = self.spatial_volume(latents.to_owned(), time.to_owned(), views.to_owned());
        let conditioning = self.target_view_conditioning(
            latent_input,
            spatial,
            clip,
            time,
            views,
            target_indices,
        );

        // [B * TN, 4, h, w]
        let latents = latents
            .reshape([b * n, c, h, w])
            .select(0, flat_target_indices::<B>(target_indices, n, &device));
        // [B * TN]
        let timesteps = timesteps.reshape([b, 1]).repeat_dim(1, tn).reshape([b * tn]);

        denoiser.denoise(latents, timesteps, &conditioning)
    }

    /// Predicting the noise of every view.
    ///
    /// The spatial volume is built once,
    /// and the views are denoised in chunks of [`Self::batch_view_count`].
    ///
    /// ## Shapes
    ///
    /// * `latents` - Noisy latents of all views, `[B, N, 4, h, w]`
    /// * `latent_input` - `[B, 4, h, w]`
    /// * `clip` - `[B, 1, 768]`
    /// * `elevations_ref` - `[B]`
    /// * `timesteps` - `[B]`
    /// * `output` - `[B, N, 4, h, w]`
    pub fn predict_noise_all_views<D: Denoiser<B>>(
        &self,
        denoiser: &D,
        latents: Tensor<B, 5>,
        latent_input: Tensor<B, 4>,
        clip: Tensor<B, 3>,
        elevations_ref: Tensor<B, 1>,
        timesteps: Tensor<B, 1, Int>,
    ) -> Tensor<B, 5> {
        let [b, n, c, h, w] = latents.dims();

        let time = self.embed_time(timesteps.to_owned());
        let views = self.embed_viewpoints(elevations_ref);
        let spatial = self.spatial_volume(latents.to_owned(), time.to_owned(), views.to_owned());

        let indices = (0..n).collect::<Vec<_>>();
        let noises = indices
            .chunks(self.batch_view_count.max(1))
            .map(|chunk| {
                #[cfg(debug_assertions)]
                log::debug!(
                    target: "multiview_volume::diffusion",
                    "predict_noise_all_views > views ({chunk:?})",
                );

                let tn = chunk.len();
                let range = chunk[0]..chunk[0] + tn;
                let target_indices = vec![chunk.to_vec(); b];
                let conditioning = self.target_view_conditioning(
                    latent_input.to_owned(),
                    spatial.to_owned(),
                    clip.to_owned(),
                    time.to_owned(),
                    views.to_owned(),
                    &target_indices,
                );

                let latents = latents
                    .to_owned()
                    .slice([0..b, range, 0..c, 0..h, 0..w])
                    .reshape([b * tn, c, h, w]);
                let timesteps = timesteps
                    .to_owned()
                    .reshape([b, 1])
                    .repeat_dim(1, tn)
                    .reshape([b * tn]);

                denoiser
                    .denoise(latents, timesteps, &conditioning)
                    .reshape([b, tn, c, h, w])
            })
            .collect();

        Tensor::cat(noises, 1)
    }
}

/// One random target view per batch element.
///
/// ## Shapes
///
/// * `output` - `[B][1]` within `0..view_count`
///
/// # Panics
///
/// If `view_count` is zero.
pub fn random_target_indices<R: Rng>(
    batch_size: usize,
    view_count: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    assert!(view_count > 0, "The view count should be positive");

    (0..batch_size)
        .map(|_| vec![rng.gen_range(0..view_count)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::OrbitConfig,
        diffusion::{interface::testing::MeanDenoiser, testing::config_small_diffusion},
    };
    use burn::{backend::NdArray, tensor::Distribution};
    use rand::{rngs::StdRng, SeedableRng};

    type B = NdArray<f32>;

    fn model_small() -> MultiviewDiffusion<B> {
        let rig = CameraRig::orbit(&OrbitConfig::new().with_view_count(4)).unwrap();
        config_small_diffusion()
            .init(rig, &Default::default())
            .unwrap()
    }

    #[test]
    fn target_view_conditioning_shapes() {
        let device = &Default::default();

        let model = model_small();
        let time = model.embed_time(Tensor::from_ints([10, 900], device));
        let views = model.embed_viewpoints(Tensor::zeros([2], device));
        let latents = Tensor::random([2, 4, 4, 8, 8], Distribution::Default, device);
        let latent_input = Tensor::<B, 4>::random([2, 4, 8, 8], Distribution::Default, device);
        let clip = Tensor::<B, 3>::random([2, 1, 12], Distribution::Default, device);
        let spatial = model.spatial_volume(latents, time.to_owned(), views.to_owned());

        let conditioning = model.target_view_conditioning(
            latent_input.to_owned(),
            spatial,
            clip.to_owned(),
            time,
            views,
            &[vec![0, 2], vec![3, 3]],
        );

        assert_eq!(conditioning.clip_embed.dims(), [4, 1, 12]);
        assert_eq!(conditioning.x_concat.dims(), [4, 4, 8, 8]);
        assert_eq!(
            conditioning.volume_feats.keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 4, 8]
        );

        // The input latent is repeated per target
        conditioning
            .x_concat
            .slice([3..4, 0..4, 0..8, 0..8])
            .into_data()
            .assert_eq(&latent_input.slice([1..2, 0..4, 0..8, 0..8]).into_data(), true);

        // The projection starts as the identity on the image embedding
        conditioning
            .clip_embed
            .slice([0..1, 0..1, 0..12])
            .into_data()
            .assert_approx_eq(&clip.slice([0..1, 0..1, 0..12]).into_data(), 5);
    }

    #[test]
    fn predict_noise_of_random_targets() {
        let device = &Default::default();

        let model = model_small();
        let target_indices = random_target_indices(3, 4, &mut StdRng::seed_from_u64(0));
        let noise = model.predict_noise(
            &MeanDenoiser,
            Tensor::random([3, 4, 4, 8, 8], Distribution::Default, device),
            Tensor::random([3, 4, 8, 8], Distribution::Default, device),
            Tensor::random([3, 1, 12], Distribution::Default, device),
            Tensor::zeros([3], device),
            Tensor::from_ints([1, 2, 3], device),
            &target_indices,
        );
        assert_eq!(noise.dims(), [3, 4, 8, 8]);
    }

    #[test]
    fn predict_noise_all_views_in_chunks() {
        let device = &Default::default();

        // 4 views in chunks of 3 and 1
        let model = model_small();
        let latents = Tensor::<B, 5>::random([2, 4, 4, 8, 8], Distribution::Default, device);
        let latent_input = Tensor::<B, 4>::random([2, 4, 8, 8], Distribution::Default, device);
        let clip = Tensor::<B, 3>::random([2, 1, 12], Distribution::Default, device);
        let elevations_ref = Tensor::<B, 1>::zeros([2], device);
        let timesteps = Tensor::<B, 1, Int>::from_ints([5, 6], device);

        let noise_all = model.predict_noise_all_views(
            &MeanDenoiser,
            latents.to_owned(),
            latent_input.to_owned(),
            clip.to_owned(),
            elevations_ref.to_owned(),
            timesteps.to_owned(),
        );
        assert_eq!(noise_all.dims(), [2, 4, 4, 8, 8]);

        // Every chunk agrees with the targeted prediction
        let noise_last = model.predict_noise(
            &MeanDenoiser,
            latents,
            latent_input,
            clip,
            elevations_ref,
            timesteps,
            &[vec![3], vec![3]],
        );
        noise_all
            .slice([0..2, 3..4, 0..4, 0..8, 0..8])
            .reshape([2, 4, 8, 8])
            .into_data()
            .assert_approx_eq(&noise_last.into_data(), 4);
    }

    #[test]
    fn random_target_indices_are_in_range() {
        let mut rng = StdRng::seed_from_u64(0x3D65);
        let indices = random_target_indices(64, 16, &mut rng);
        assert_eq!(indices.len(), 64);
        assert!(indices.iter().all(|indices| indices.len() == 1 && indices[0] < 16));
    }

    #[test]
    #[should_panic(expected = "The view count should be positive")]
    fn random_target_indices_without_views() {
        random_target_indices(2, 0, &mut StdRng::seed_from_u64(0));
    }
}
