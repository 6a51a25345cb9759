//! Default geometry and network sizes.

/// Image size the camera intrinsics are stored for.
pub const CAMERA_IMAGE_SIZE: usize = 256;

/// Latent downsampling factor of the image autoencoder.
pub const LATENT_DOWNSAMPLE: usize = 8;

/// Latent channel count.
pub const LATENT_CHANNELS: usize = 4;

/// Latent scaling factor of the image autoencoder.
pub const LATENT_SCALE: f64 = 0.18215;

/// Input image size.
pub const INPUT_IMAGE_SIZE: usize = 256;

/// Number of depth samples of a frustum volume.
pub const FRUSTUM_VOLUME_DEPTH: usize = 48;

/// Half extent of a frustum volume along the optical axis.
///
/// `sqrt(3) / 2`
pub const FRUSTUM_VOLUME_LENGTH: f64 = 0.86603;

/// Assumed distance from every camera to the world origin.
pub const ORIGIN_DEPTH: f64 = 1.5;

/// Voxel count along each axis of the spatial volume.
pub const SPATIAL_VOLUME_SIZE: usize = 32;

/// Half extent of the spatial volume cube.
pub const SPATIAL_VOLUME_LENGTH: f64 = 0.5;

/// Elevation of every target view in radians.
///
/// It is negated, i.e., `-30°`.
pub const ELEVATION_TARGET: f64 = -std::f64::consts::PI / 6.0;

/// Timestep embedding dimension.
pub const TIME_EMBED_DIM: usize = 256;

/// Viewpoint embedding dimension.
pub const VIEWPOINT_DIM: usize = 4;

/// Image embedding dimension of the CLIP-style encoder.
pub const CLIP_EMBED_DIM: usize = 768;

/// Group count of every group normalization.
pub const NORM_GROUP_COUNT: usize = 8;

/// Channel counts of the volume networks from the finest to the coarsest level.
pub const VOLUME_DIMS: [usize; 4] = [64, 128, 256, 512];
