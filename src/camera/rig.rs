//! The fixed camera metadata shared by every forward pass.

pub use super::Camera;
pub use burn::config::Config;

use crate::{error::Error, preset::volume::*};
use std::f64::consts::PI;

/// The configuration of [`CameraRig::orbit`].
///
/// All cameras sit on a ring around the world origin and look at it.
/// The world is Z-up and the cameras follow the OpenCV convention
/// (X right, Y down, Z forward).
#[derive(Config, Copy, Debug)]
pub struct OrbitConfig {
    /// Number of views.
    #[config(default = 16)]
    pub view_count: usize,
    /// Elevation of every camera in degrees.
    #[config(default = 30.0)]
    pub elevation_degrees: f64,
    /// Distance from every camera to the origin.
    #[config(default = "ORIGIN_DEPTH")]
    pub distance: f64,
    /// Focal length in pixels of [`Self::image_size`].
    #[config(default = 280.0)]
    pub focal_length: f64,
    /// Image size the intrinsics are given for.
    #[config(default = "CAMERA_IMAGE_SIZE")]
    pub image_size: usize,
}

/// A table of cameras with their azimuths.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraRig {
    /// Azimuths in radians within `[-PI, PI)`.
    ///
    /// The first view has azimuth `0`.
    azimuths: Vec<f64>,
    /// Cameras.
    cameras: Vec<Camera>,
    /// Image size the intrinsics are given for.
    image_size: usize,
}

impl CameraRig {
    /// Validate and take ownership of the camera metadata.
    ///
    /// The azimuths are normalized to `[-PI, PI)`.
    pub fn new(
        cameras: Vec<Camera>,
        azimuths: Vec<f64>,
        image_size: usize,
    ) -> Result<Self, Error> {
        if cameras.is_empty() {
            return Err(Error::Validation(
                "The camera count".into(),
                "at least 1".into(),
            ));
        }
        if azimuths.len() != cameras.len() {
            return Err(Error::Validation(
                format!("The azimuth count ({})", azimuths.len()),
                format!("the camera count ({})", cameras.len()),
            ));
        }
        if image_size == 0 {
            return Err(Error::Validation(
                "The image size".into(),
                "positive".into(),
            ));
        }
        cameras
            .iter()
            .enumerate()
            .try_for_each(|(index, camera)| camera.validate(index).map(|_| ()))?;

        let azimuths = azimuths.into_iter().map(normalize_azimuth).collect();

        Ok(Self {
            azimuths,
            cameras,
            image_size,
        })
    }

    /// Cameras evenly spaced in azimuth on a ring at a fixed elevation.
    pub fn orbit(config: &OrbitConfig) -> Result<Self, Error> {
        let elevation = config.elevation_degrees.to_radians();
        let half = (config.image_size as f64) / 2.0;
        let f = config.focal_length;
        let intrinsics = [[f, 0.0, half], [0.0, f, half], [0.0, 0.0, 1.0]];

        let azimuths = (0..config.view_count)
            .map(|index| 2.0 * PI * index as f64 / config.view_count as f64)
            .collect::<Vec<_>>();
        let cameras = azimuths
            .iter()
            .map(|&azimuth| Camera {
                intrinsics,
                extrinsics: look_at_origin(elevation, azimuth, config.distance),
            })
            .collect();

        Self::new(cameras, azimuths, config.image_size)
    }

    /// Rescaling the intrinsics to another image size.
    pub fn resize(
        &mut self,
        image_size: usize,
    ) -> &mut Self {
        let ratio = image_size as f64 / self.image_size as f64;
        self.cameras.iter_mut().for_each(|camera| {
            camera.intrinsics = camera.intrinsics_scaled(ratio);
        });
        self.image_size = image_size;
        self
    }
}

/// Accessors.
impl CameraRig {
    /// Azimuths in radians within `[-PI, PI)`.
    #[inline]
    pub fn azimuths(&self) -> &[f64] {
        &self.azimuths
    }

    /// The camera of the view `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    #[inline]
    pub fn camera(
        &self,
        index: usize,
    ) -> &Camera {
        &self.cameras[index]
    }

    #[inline]
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Image size the intrinsics are given for.
    #[inline]
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Number of views, i.e., `N`.
    #[inline]
    pub fn view_count(&self) -> usize {
        self.cameras.len()
    }

    /// The cameras of the views `indices`, in order and with repetitions.
    ///
    /// # Panics
    ///
    /// If any index is out of range.
    pub fn select(
        &self,
        indices: &[usize],
    ) -> Vec<&Camera> {
        indices.iter().map(|&index| self.camera(index)).collect()
    }
}

/// `(azimuth + PI) mod 2PI - PI`
#[inline]
pub fn normalize_azimuth(azimuth: f64) -> f64 {
    (azimuth + PI).rem_euclid(2.0 * PI) - PI
}

/// World-to-camera transformation of a camera looking at the origin.
fn look_at_origin(
    elevation: f64,
    azimuth: f64,
    distance: f64,
) -> [[f64; 4]; 3] {
    let position = [
        distance * elevation.cos() * azimuth.cos(),
        distance * elevation.cos() * azimuth.sin(),
        distance * elevation.sin(),
    ];
    let forward = normalize(position.map(|c| -c));
    let right = normalize(cross(&forward, &[0.0, 0.0, 1.0]));
    let down = cross(&forward, &right);

    let rotation = [right, down, forward];
    let translation =
        rotation.map(|row| -(0..3).map(|i| row[i] * position[i]).sum::<f64>());

    [0, 1, 2].map(|row| {
        [
            rotation[row][0],
            rotation[row][1],
            rotation[row][2],
            translation[row],
        ]
    })
}

#[inline]
fn cross(
    a: &[f64; 3],
    b: &[f64; 3],
) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn normalize(v: [f64; 3]) -> [f64; 3] {
    let norm = v.iter().map(|c| c * c).sum::<f64>().sqrt();
    v.map(|c| c / norm)
}
