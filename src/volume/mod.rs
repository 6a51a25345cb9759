//! 3D-aware volumes conditioning the target views.
//!
//! The noisy latents of all views are lifted into one spatial volume,
//! which is then resampled into a frustum volume per target view.

pub mod frustum;
pub mod spatial;

pub use crate::{
    camera::CameraRig,
    error::Error,
    network::*,
};
pub use burn::tensor::Int;

use humansize::{format_size, BINARY};
use std::fmt;

/// The configuration for [`SpatialVolume`].
#[derive(Config, Debug)]
pub struct SpatialVolumeConfig {
    /// Number of views, i.e., `N`.
    pub view_count: usize,
    /// Side length of the images the latents are encoded from.
    #[config(default = "INPUT_IMAGE_SIZE")]
    pub input_image_size: usize,
    /// Number of depth samples per frustum ray, i.e., `D`.
    #[config(default = "FRUSTUM_VOLUME_DEPTH")]
    pub frustum_volume_depth: usize,
    /// Half extent of a frustum volume along the optical axis.
    #[config(default = "FRUSTUM_VOLUME_LENGTH")]
    pub frustum_volume_length: f64,
    /// Assumed distance from every camera to the world origin.
    #[config(default = "ORIGIN_DEPTH")]
    pub origin_depth: f64,
    /// Voxel count along each axis of the spatial volume, i.e., `V`.
    #[config(default = "SPATIAL_VOLUME_SIZE")]
    pub spatial_volume_size: usize,
    /// Half extent of the spatial volume cube, i.e., `L`.
    #[config(default = "SPATIAL_VOLUME_LENGTH")]
    pub spatial_volume_length: f64,
    /// Timestep embedding dimension.
    #[config(default = "TIME_EMBED_DIM")]
    pub dim_time: usize,
    /// Viewpoint embedding dimension.
    #[config(default = "VIEWPOINT_DIM")]
    pub dim_view: usize,
    /// Feature channels per view.
    #[config(default = 16)]
    pub dim_feature: usize,
    /// Channels of the volume networks from the finest to the coarsest level.
    #[config(default = "VOLUME_DIMS")]
    pub dims: [usize; 4],
}

/// Building the spatial volume and the frustum volumes.
#[derive(Module)]
pub struct SpatialVolume<B: Backend> {
    pub encoder: NoisyViewEncoder<B>,
    pub spatial_net: SpatialVolumeNet3d<B>,
    pub frustum_net: FrustumVolumeNet3d<B>,
    pub input_image_size: usize,
    pub frustum_volume_depth: usize,
    pub frustum_volume_length: f64,
    pub origin_depth: f64,
    pub spatial_volume_size: usize,
    pub spatial_volume_length: f64,
}

impl SpatialVolumeConfig {
    /// Side length of the frustum volumes, i.e., `S`.
    #[inline]
    pub fn frustum_volume_size(&self) -> usize {
        self.input_image_size / LATENT_DOWNSAMPLE
    }

    /// Checking the sizes that the networks can process.
    pub fn validate(&self) -> Result<&Self, Error> {
        let level_divisor = 1 << (self.dims.len() - 1);

        if self.view_count == 0 {
            return Err(Error::Validation(
                "The view count".into(),
                "at least 1".into(),
            ));
        }
        if self.input_image_size % (LATENT_DOWNSAMPLE * level_divisor) != 0 {
            return Err(Error::Validation(
                format!("The input image size ({})", self.input_image_size),
                format!("divisible by {}", LATENT_DOWNSAMPLE * level_divisor),
            ));
        }
        for (name, size) in [
            ("The frustum volume depth", self.frustum_volume_depth),
            ("The spatial volume size", self.spatial_volume_size),
        ] {
            if size == 0 || size % level_divisor != 0 {
                return Err(Error::Validation(
                    format!("{name} ({size})"),
                    format!("a positive multiple of {level_divisor}"),
                ));
            }
        }
        if let Some(dim) = self.dims.iter().find(|&&dim| dim % NORM_GROUP_COUNT != 0) {
            return Err(Error::Validation(
                format!("The volume channel count ({dim})"),
                format!("divisible by {NORM_GROUP_COUNT}"),
            ));
        }
        if !(self.spatial_volume_length > 0.0) {
            return Err(Error::Validation(
                format!("The spatial volume length ({})", self.spatial_volume_length),
                "positive".into(),
            ));
        }
        if !(self.origin_depth > self.frustum_volume_length
            && self.frustum_volume_length > 0.0)
        {
            return Err(Error::Validation(
                format!("The frustum volume length ({})", self.frustum_volume_length),
                format!("in (0, {})", self.origin_depth),
            ));
        }

        Ok(self)
    }

    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SpatialVolume<B> {
        let encoder = NoisyViewEncoderConfig::new()
            .with_dim_output(self.dim_feature)
            .with_dim_time(self.dim_time)
            .with_dim_view(self.dim_view)
            .init(device);
        let spatial_net =
            SpatialVolumeNet3dConfig::new(self.dim_feature * self.view_count)
                .with_dim_time(self.dim_time)
                .with_dims(self.dims)
                .init(device);
        let frustum_net = FrustumVolumeNet3dConfig::new()
            .with_dim_input(self.dims[0])
            .with_dim_time(self.dim_time)
            .with_dim_view(self.dim_view)
            .with_dims(self.dims)
            .init(device);

        SpatialVolume {
            encoder,
            spatial_net,
            frustum_net,
            input_image_size: self.input_image_size,
            frustum_volume_depth: self.frustum_volume_depth,
            frustum_volume_length: self.frustum_volume_length,
            origin_depth: self.origin_depth,
            spatial_volume_size: self.spatial_volume_size,
            spatial_volume_length: self.spatial_volume_length,
        }
    }
}

impl<B: Backend> SpatialVolume<B> {
    /// Side length of the frustum volumes, i.e., `S`.
    #[inline]
    pub fn frustum_volume_size(&self) -> usize {
        self.input_image_size / LATENT_DOWNSAMPLE
    }

    /// Size of the parameters in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.num_params() * size_of::<B::FloatElem>()
    }

    /// Readable size of the parameters.
    #[inline]
    pub fn size_readable(&self) -> String {
        format_size(self.size(), BINARY.decimal_places(1))
    }
}

/// Flat indices of `(batch, view)` pairs into `[B * N, ...]`.
///
/// ## Shapes
///
/// * `output` - `[B * TN]`, ordered by batch element, then by target
pub fn flat_target_indices<B: Backend>(
    target_indices: &[Vec<usize>],
    view_count: usize,
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    let indices = target_indices
        .iter()
        .enumerate()
        .flat_map(|(batch, indices)| {
            indices
                .iter()
                .map(move |&index| (batch * view_count + index) as i32)
        })
        .collect::<Vec<_>>();
    let count = indices.len();

    Tensor::from_data(
        TensorData::new(indices, [count]).convert::<B::IntElem>(),
        device,
    )
}

impl<B: Backend> fmt::Debug for SpatialVolume<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("SpatialVolume")
            .field("devices", &self.devices())
            .field("size_readable()", &self.size_readable())
            .field("input_image_size", &self.input_image_size)
            .field("frustum_volume_size()", &self.frustum_volume_size())
            .field("frustum_volume_depth", &self.frustum_volume_depth)
            .field("spatial_volume_size", &self.spatial_volume_size)
            .finish()
    }
}
