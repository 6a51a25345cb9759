//! Lifting the latents of all views into the spatial volume.

pub use super::*;

use crate::{
    function::sample::grid_sample_2d,
    geometry::{spatial_grid, warp_coordinates},
};

impl<B: Backend> SpatialVolume<B> {
    /// Building the spatial volume of every batch element.
    ///
    /// ## Arguments
    ///
    /// * `latents` - Noisy latents of all views, `[B, N, 4, h, w]`.
    /// * `time` - Timestep embeddings, `[B, T]`.
    /// * `views` - Viewpoint embeddings, `[B, N, 4]`.
    /// * `rig` - The `N` cameras with intrinsics of the input image size.
    ///
    /// ## Shapes
    ///
    /// * `output` - `[B, dims[0], V, V, V]`
    ///
    /// ## Details
    ///
    /// The unprojected features of all views are refined by the 3D U-Net.
    pub fn construct_spatial_volume(
        &self,
        latents: Tensor<B, 5>,
        time: Tensor<B, 2>,
        views: Tensor<B, 3>,
        rig: &CameraRig,
    ) -> Tensor<B, 5> {
        let volume = self.unproject_views(latents, time.to_owned(), views, rig);
        self.spatial_net.forward(volume, time)
    }

    /// Unprojecting the encoded features of every view into the voxels.
    ///
    /// ## Shapes
    ///
    /// * `output` - `[B, N * C_feature, V, V, V]`, the features of view `i`
    ///   at channels `i * C_feature..(i + 1) * C_feature`
    ///
    /// ## Details
    ///
    /// Every view is encoded into features. The voxel centers over `[-L, L]³`
    /// are projected through the camera of the view and bilinearly sampled.
    ///
    /// # Panics
    ///
    /// * If the view count differs from the rig.
    /// * If the rig is not given for the input image size.
    pub fn unproject_views(
        &self,
        latents: Tensor<B, 5>,
        time: Tensor<B, 2>,
        views: Tensor<B, 3>,
        rig: &CameraRig,
    ) -> Tensor<B, 5> {
        let device = latents.device();
        let [b, n, c, h, w] = latents.dims();
        let [_, _, dim_view] = views.dims();
        let v = self.spatial_volume_size;
        let point_count = v * v * v;
        assert_eq!(n, rig.view_count(), "The view count should match the rig");
        assert_eq!(
            rig.image_size(),
            self.input_image_size,
            "The rig should be given for the input image size"
        );

        #[cfg(debug_assertions)]
        log::debug!(
            target: "multiview_volume::volume::spatial",
            "unproject_views > batch ({b}) > views ({n}) > voxels ({v}^3)",
        );

        // [B, 3, V * V * V]
        let grid = spatial_grid::<B>(v, self.spatial_volume_length, &device)
            .reshape([1, 3, point_count])
            .repeat_dim(0, b);

        let features = (0..n)
            .map(|index| {
                let latent = latents
                    .to_owned()
                    .slice([0..b, index..index + 1, 0..c, 0..h, 0..w])
                    .reshape([b, c, h, w]);
                let view = views
                    .to_owned()
                    .slice([0..b, index..index + 1, 0..dim_view])
                    .reshape([b, dim_view]);
                let condition = Condition::new(time.to_owned()).with_view(view);

                // [B, C_feature, h, w]
                let features = self.encoder.forward(latent, &condition);
                let dim_feature = features.dims()[1];

                let cameras = vec![rig.camera(index); b];
                let coordinates = warp_coordinates(
                    grid.to_owned(),
                    w,
                    self.input_image_size,
                    &cameras,
                );

                grid_sample_2d(features, coordinates).reshape([b, dim_feature, v, v, v])
            })
            .collect();

        // [B, N * C_feature, V, V, V]
        let volume = Tensor::cat(features, 1);

        #[cfg(debug_assertions)]
        log::debug!(
            target: "multiview_volume::volume::spatial",
            "unproject_views > output ({:?})",
            volume.dims(),
        );

        volume
    }
}
