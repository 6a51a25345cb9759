//! Multiview diffusion conditioned on the spatial volume.

pub mod forward;
pub mod interface;

pub use crate::volume::*;
pub use forward::*;
pub use interface::*;

use humansize::{format_size, BINARY};
use std::fmt;

/// The configuration for [`MultiviewDiffusion`].
#[derive(Config, Debug)]
pub struct MultiviewDiffusionConfig {
    /// Volume sizes and dimensions.
    pub volume: SpatialVolumeConfig,
    /// Timestep embedding.
    #[config(default = "TimeEmbeddingConfig::new()")]
    pub time_embedding: TimeEmbeddingConfig,
    /// Image embedding projection.
    #[config(default = "ClipProjectionConfig::new()")]
    pub clip_projection: ClipProjectionConfig,
    /// Maximum number of target views per pass when denoising all views.
    #[config(default = 4)]
    pub batch_view_count: usize,
}

/// The learned parameters of [`MultiviewDiffusion`].
#[derive(Debug, Module)]
pub struct MultiviewDiffusionNet<B: Backend> {
    pub time_embedding: TimeEmbedding<B>,
    pub clip_projection: ClipProjection<B>,
    pub spatial_volume: SpatialVolume<B>,
}

/// The volume conditioning of a multiview diffusion model.
///
/// It owns the camera rig of its views.
#[derive(Clone)]
pub struct MultiviewDiffusion<B: Backend> {
    pub net: MultiviewDiffusionNet<B>,
    pub batch_view_count: usize,
    rig: CameraRig,
}

impl MultiviewDiffusionConfig {
    /// Checking the consistency of the sub-configurations.
    pub fn validate(&self) -> Result<&Self, Error> {
        self.volume.validate()?;

        if self.time_embedding.dim != self.volume.dim_time {
            return Err(Error::Validation(
                format!("The timestep embedding dimension ({})", self.time_embedding.dim),
                format!("the volume's ({})", self.volume.dim_time),
            ));
        }
        if self.clip_projection.dim_view != self.volume.dim_view {
            return Err(Error::Validation(
                format!(
                    "The viewpoint dimension of the projection ({})",
                    self.clip_projection.dim_view
                ),
                format!("the volume's ({})", self.volume.dim_view),
            ));
        }
        if self.volume.dim_view != VIEWPOINT_DIM {
            return Err(Error::Validation(
                format!("The viewpoint embedding dimension ({})", self.volume.dim_view),
                format!("{VIEWPOINT_DIM}"),
            ));
        }
        if self.batch_view_count == 0 {
            return Err(Error::Validation(
                "The batch view count".into(),
                "at least 1".into(),
            ));
        }

        Ok(self)
    }

    /// Initialize from the configuration with the cameras of every view.
    ///
    /// The intrinsics of `rig` are rescaled to the input image size.
    pub fn init<B: Backend>(
        &self,
        mut rig: CameraRig,
        device: &B::Device,
    ) -> Result<MultiviewDiffusion<B>, Error> {
        self.validate()?;
        if rig.view_count() != self.volume.view_count {
            return Err(Error::Validation(
                format!("The camera count ({})", rig.view_count()),
                format!("the view count ({})", self.volume.view_count),
            ));
        }
        rig.resize(self.volume.input_image_size);

        let net = MultiviewDiffusionNet {
            time_embedding: self.time_embedding.init(device),
            clip_projection: self.clip_projection.init(device),
            spatial_volume: self.volume.init(device),
        };

        #[cfg(debug_assertions)]
        log::debug!(
            target: "multiview_volume::diffusion",
            "init > views ({}) > parameters ({})",
            rig.view_count(),
            net.spatial_volume.size_readable(),
        );

        Ok(MultiviewDiffusion {
            net,
            batch_view_count: self.batch_view_count,
            rig,
        })
    }
}

impl<B: Backend> MultiviewDiffusion<B> {
    /// The cameras of every view.
    #[inline]
    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Number of views, i.e., `N`.
    #[inline]
    pub fn view_count(&self) -> usize {
        self.rig.view_count()
    }

    /// Size of the parameters in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.net.num_params() * size_of::<B::FloatElem>()
    }

    /// Readable size of the parameters.
    #[inline]
    pub fn size_readable(&self) -> String {
        format_size(self.size(), BINARY.decimal_places(1))
    }
}

impl<B: Backend> fmt::Debug for MultiviewDiffusion<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("MultiviewDiffusion")
            .field("devices", &self.net.devices())
            .field("size_readable()", &self.size_readable())
            .field("view_count()", &self.view_count())
            .field("batch_view_count", &self.batch_view_count)
            .field("spatial_volume", &self.net.spatial_volume)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::volume::testing::config_small;

    /// A small model over 4 views of 64 x 64 images.
    pub fn config_small_diffusion() -> MultiviewDiffusionConfig {
        MultiviewDiffusionConfig::new(config_small())
            .with_time_embedding(TimeEmbeddingConfig::new().with_dim(8))
            .with_clip_projection(ClipProjectionConfig::new().with_dim_clip(12))
            .with_batch_view_count(3)
    }
}
