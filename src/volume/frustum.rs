//! Resampling the spatial volume into the frustums of target views.

pub use super::*;

use crate::{
    function::sample::grid_sample_3d,
    geometry::{frustum_bounds, frustum_volume},
};

impl<B: Backend> SpatialVolume<B> {
    /// Building the frustum feature pyramid of every requested target view.
    ///
    /// ## Arguments
    ///
    /// * `spatial` - Spatial volumes, `[B, C, V, V, V]`.
    /// * `time` - Timestep embeddings, `[B, T]`.
    /// * `views` - Viewpoint embeddings, `[B, N, 4]`.
    /// * `rig` - The `N` cameras with intrinsics of the input image size.
    /// * `target_indices` - `TN` view indices per batch element, repetitions allowed.
    ///
    /// ## Shapes
    ///
    /// * `output.0[S / 2^i]` - `[B * TN, dims[i], D / 2^i, S / 2^i, S / 2^i]`
    /// * `output.1` - Depths, `[B * TN, 1, D, S, S]`
    ///
    /// The targets are ordered by batch element, then by target.
    ///
    /// # Panics
    ///
    /// * If the target counts differ between batch elements.
    /// * If any index is out of range.
    pub fn construct_frustum_volume(
        &self,
        spatial: Tensor<B, 5>,
        time: Tensor<B, 2>,
        views: Tensor<B, 3>,
        rig: &CameraRig,
        target_indices: &[Vec<usize>],
    ) -> (FeaturePyramid<B>, Tensor<B, 5>) {
        let device = spatial.device();
        let [b, n, dim_view] = views.dims();
        let [_, dim_time] = time.dims();

        let (features, depths) = self.resample_frustum_volume(spatial, rig, target_indices);
        let [bt, _, _, _, _] = features.dims();
        let tn = bt / b.max(1);

        // [B * TN, 4]
        let views = views
            .reshape([b * n, dim_view])
            .select(0, flat_target_indices::<B>(target_indices, n, &device));
        // [B * TN, T]
        let time = time.unsqueeze_dim::<3>(1).repeat_dim(1, tn).reshape([bt, dim_time]);

        let pyramid = self
            .frustum_net
            .forward(features, &Condition::new(time).with_view(views));

        #[cfg(debug_assertions)]
        log::debug!(
            target: "multiview_volume::volume::frustum",
            "construct_frustum_volume > levels ({:?})",
            pyramid.keys().collect::<Vec<_>>(),
        );

        (pyramid, depths)
    }

    /// Sampling the spatial volume inside the frustum of every requested target view.
    ///
    /// ## Shapes
    ///
    /// * `spatial` - `[B, C, V, V, V]`
    /// * `output.0` - Features, `[B * TN, C, D, S, S]`
    /// * `output.1` - Depths, `[B * TN, 1, D, S, S]`
    ///
    /// ## Details
    ///
    /// The frustum positions are built through the camera of each target,
    /// divided by `L` and trilinearly sampled.
    ///
    /// # Panics
    ///
    /// * If the target counts differ between batch elements.
    /// * If any index is out of range.
    pub fn resample_frustum_volume(
        &self,
        spatial: Tensor<B, 5>,
        rig: &CameraRig,
        target_indices: &[Vec<usize>],
    ) -> (Tensor<B, 5>, Tensor<B, 5>) {
        let device = spatial.device();
        let [b, c, v_d, v_h, v_w] = spatial.dims();
        let d = self.frustum_volume_depth;
        let s = self.frustum_volume_size();
        assert_eq!(target_indices.len(), b, "There should be targets per batch");
        let tn = target_indices.first().map(Vec::len).unwrap_or_default();
        assert!(
            target_indices.iter().all(|indices| indices.len() == tn),
            "The target count should be equal in every batch"
        );
        let bt = b * tn;

        #[cfg(debug_assertions)]
        log::debug!(
            target: "multiview_volume::volume::frustum",
            "resample_frustum_volume > batch ({b}) > targets ({tn}) > frustum ({d} x {s}^2)",
        );

        let cameras = target_indices
            .iter()
            .flatten()
            .map(|&index| rig.camera(index))
            .collect::<Vec<_>>();
        let (near, far) = frustum_bounds::<B>(
            bt,
            s,
            self.origin_depth,
            self.frustum_volume_length,
            &device,
        );
        let (positions, depths) =
            frustum_volume(d, s, self.input_image_size, &cameras, near, far);

        // [B * TN, D * S * S, 3] in [-1, 1] inside the spatial volume
        let grid = positions
            .div_scalar(self.spatial_volume_length)
            .reshape([bt, 3, d * s * s])
            .swap_dims(1, 2);

        // [B * TN, C, V, V, V]
        let spatial = spatial
            .unsqueeze_dim::<6>(1)
            .repeat_dim(1, tn)
            .reshape([bt, c, v_d, v_h, v_w]);
        let features = grid_sample_3d(spatial, grid).reshape([bt, c, d, s, s]);

        (features, depths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::testing::{config_small, rig_small};
    use burn::{backend::NdArray, tensor::Distribution};

    type B = NdArray<f32>;

    #[test]
    fn construct_frustum_volume_pyramid() {
        let device = &Default::default();

        let volume = config_small().init::<B>(device);
        let rig = rig_small();
        let spatial = Tensor::random([2, 8, 8, 8, 8], Distribution::Default, device);
        let time = Tensor::ones([2, 8], device);
        let views = rig.viewpoint_embedding(Tensor::<B, 1>::zeros([2], device));

        let (pyramid, depths) = volume.construct_frustum_volume(
            spatial,
            time,
            views,
            &rig,
            &[vec![1, 3, 3], vec![0, 2, 1]],
        );

        assert_eq!(pyramid.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4, 8]);
        assert_eq!(pyramid[&8].dims(), [6, 8, 8, 8, 8]);
        assert_eq!(pyramid[&4].dims(), [6, 8, 4, 4, 4]);
        assert_eq!(pyramid[&2].dims(), [6, 16, 2, 2, 2]);
        assert_eq!(pyramid[&1].dims(), [6, 16, 1, 1, 1]);
        assert_eq!(depths.dims(), [6, 1, 8, 8, 8]);
    }

    #[test]
    fn repeated_targets_are_identical() {
        let device = &Default::default();

        let volume = config_small().init::<B>(device);
        let rig = rig_small();
        let spatial = Tensor::<B, 5>::random([1, 8, 8, 8, 8], Distribution::Default, device);
        let time = Tensor::<B, 2>::random([1, 8], Distribution::Default, device);
        let views = rig.viewpoint_embedding(Tensor::<B, 1>::zeros([1], device));

        let (pyramid_1, _) = volume.construct_frustum_volume(
            spatial.to_owned(),
            time.to_owned(),
            views.to_owned(),
            &rig,
            &[vec![0]],
        );
        let (pyramid_2, _) =
            volume.construct_frustum_volume(spatial, time, views, &rig, &[vec![0, 0]]);

        for (size, level_1) in pyramid_1 {
            let [_, c, d, h, w] = level_1.dims();
            let level_2 = pyramid_2[&size].to_owned();
            let level_2_first = level_2.to_owned().slice([0..1, 0..c, 0..d, 0..h, 0..w]);
            let level_2_second = level_2.slice([1..2, 0..c, 0..d, 0..h, 0..w]);
            level_1
                .to_owned()
                .into_data()
                .assert_approx_eq(&level_2_first.into_data(), 5);
            level_1.into_data().assert_approx_eq(&level_2_second.into_data(), 5);
        }
    }

    #[test]
    fn depths_stay_within_bounds() {
        let device = &Default::default();

        let volume = config_small().init::<B>(device);
        let rig = rig_small();
        let time = Tensor::<B, 2>::ones([1, 8], device);
        let views = rig.viewpoint_embedding(Tensor::<B, 1>::zeros([1], device));
        let spatial = Tensor::<B, 5>::zeros([1, 8, 8, 8, 8], device);

        let (_, depths) =
            volume.construct_frustum_volume(spatial, time, views, &rig, &[vec![0]]);
        let depths = depths.into_data().to_vec::<f32>().unwrap();
        let (near, far) = ((1.5 - 0.86603) as f32, (1.5 + 0.86603) as f32);
        assert!(depths.iter().all(|&d| d >= near - 1e-6 && d <= far + 1e-6));
    }

    #[test]
    fn gradient_flows_to_the_spatial_volume() {
        use crate::preset::backend::Autodiff;

        type AB = Autodiff<B>;
        let device = &Default::default();

        let volume = config_small().init::<AB>(device);
        let rig = rig_small();
        let spatial =
            Tensor::<AB, 5>::random([1, 8, 8, 8, 8], Distribution::Default, device)
                .require_grad();
        let time = Tensor::<AB, 2>::ones([1, 8], device);
        let views = rig.viewpoint_embedding(Tensor::<AB, 1>::zeros([1], device));

        let (pyramid, _) = volume.construct_frustum_volume(
            spatial.to_owned(),
            time,
            views,
            &rig,
            &[vec![2]],
        );
        let grads = pyramid[&8].to_owned().sum().backward();
        let spatial_grad = spatial.grad(&grads).unwrap();

        assert_eq!(spatial_grad.dims(), [1, 8, 8, 8, 8]);
        assert!(spatial_grad.abs().sum().into_scalar() > 0.0);
    }

    #[test]
    fn resampled_features_follow_the_target_cameras() {
        use crate::geometry::spatial_grid;

        let device = &Default::default();

        let config = config_small();
        let volume = config.init::<B>(device);
        let rig = rig_small();
        let length = config.spatial_volume_length;
        let v = config.spatial_volume_size;
        let (d, s) = (config.frustum_volume_depth, config.frustum_volume_size());
        let targets = vec![2, 0, 3, 1];

        // The world x coordinate of every voxel
        let spatial = spatial_grid::<B>(v, length, device).slice([0..1, 0..1, 0..v, 0..v, 0..v]);
        let (features, depths) =
            volume.resample_frustum_volume(spatial, &rig, &[targets.to_owned()]);
        assert_eq!(features.dims(), [4, 1, d, s, s]);
        assert_eq!(depths.dims(), [4, 1, d, s, s]);

        let cameras = targets.iter().map(|&index| rig.camera(index)).collect::<Vec<_>>();
        let (near, far) = frustum_bounds::<B>(
            4,
            s,
            config.origin_depth,
            config.frustum_volume_length,
            device,
        );
        let (positions, _) =
            frustum_volume(d, s, config.input_image_size, &cameras, near, far);

        let point_count = d * s * s;
        let features = features.into_data().to_vec::<f32>().unwrap();
        let positions = positions.into_data().to_vec::<f32>().unwrap();
        let bound = (length - 1e-3) as f32;
        for target in 0..targets.len() {
            let offset = target * 3 * point_count;
            let mut inside_count = 0;
            for point in 0..point_count {
                let [x, y, z] =
                    [0, 1, 2].map(|axis| positions[offset + axis * point_count + point]);
                if x.abs().max(y.abs()).max(z.abs()) > bound {
                    continue;
                }
                inside_count += 1;

                let feature = features[target * point_count + point];
                assert!(
                    (feature - x).abs() < 1e-4,
                    "{target}, {point}: {feature} != {x}"
                );
            }
            assert!(inside_count > 0, "{target}");
        }
    }

    #[test]
    fn different_targets_give_different_pyramids() {
        let device = &Default::default();

        let volume = config_small().init::<B>(device);
        let rig = rig_small();
        let spatial = Tensor::<B, 5>::random([1, 8, 8, 8, 8], Distribution::Default, device);
        let time = Tensor::<B, 2>::ones([1, 8], device);
        let views = rig.viewpoint_embedding(Tensor::<B, 1>::zeros([1], device));

        let (features_1, _) =
            volume.resample_frustum_volume(spatial.to_owned(), &rig, &[vec![1]]);
        let (features_3, _) =
            volume.resample_frustum_volume(spatial.to_owned(), &rig, &[vec![3]]);
        let difference = (features_1 - features_3).abs().max().into_scalar();
        assert!(difference > 1e-4, "{difference}");

        let (pyramid_1, _) = volume.construct_frustum_volume(
            spatial.to_owned(),
            time.to_owned(),
            views.to_owned(),
            &rig,
            &[vec![1]],
        );
        let (pyramid_3, _) =
            volume.construct_frustum_volume(spatial, time, views, &rig, &[vec![3]]);
        for (size, level_1) in pyramid_1 {
            let level_3 = pyramid_3[&size].to_owned();
            let difference = (level_1 - level_3).abs().max().into_scalar();
            assert!(difference > 0.0, "{size}: {difference}");
        }
    }
}
