//! Projecting world points onto the feature maps of source views.

pub use super::*;

/// Minimum depth of a projected point.
pub const DEPTH_MIN: f64 = 1e-4;

/// Normalized sampling coordinates of world points in each camera.
///
/// ## Arguments
///
/// * `points` - World positions, `[B, 3, P]`.
/// * `warp_size` - Side length of the sampled feature map.
/// * `input_size` - Side length of the image the intrinsics are given for.
/// * `cameras` - One camera per batch element.
///
/// ## Shapes
///
/// * `output` - `[B, P, 2]` as `(x, y)`
///
/// ## Details
///
/// The intrinsics are scaled by `warp_size / input_size`.
/// The pixel `u` is remapped by `u / ((warp_size - 1) / 2) - 1`,
/// which matches the corner-aligned sampling in [`crate::function::sample`].
///
/// Points behind the camera are clamped to [`DEPTH_MIN`] and fall outside
/// the map, so they sample as zeros.
pub fn warp_coordinates<B: Backend>(
    points: Tensor<B, 3>,
    warp_size: usize,
    input_size: usize,
    cameras: &[&Camera],
) -> Tensor<B, 3> {
    let [b, _, p] = points.dims();
    assert_eq!(
        b,
        cameras.len(),
        "The camera count should be the batch size of points"
    );

    let ratio = warp_size as f64 / input_size as f64;
    let projections = matrices_to_tensor::<B>(
        cameras.iter().map(|camera| camera.projection(ratio)),
        &points.device(),
    );

    // [B, 3, P]
    let pixels = transform_points(projections, points);
    let depths = pixels.to_owned().slice([0..b, 2..3, 0..p]).clamp_min(DEPTH_MIN);
    let half = (warp_size as f64 - 1.0) / 2.0;

    pixels
        .slice([0..b, 0..2, 0..p])
        .div(depths)
        .div_scalar(half)
        .sub_scalar(1.0)
        .swap_dims(1, 2)
}
