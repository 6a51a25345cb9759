//! Sampling points inside camera frustums.

pub use super::*;

use super::grid::linspace;

/// World positions and depths of a frustum volume per camera.
///
/// ## Arguments
///
/// * `depth_count` - Depth samples per pixel, i.e., `D`.
/// * `volume_size` - Side length of the frustum volume, i.e., `S`.
/// * `input_size` - Side length of the image the intrinsics are given for.
/// * `cameras` - One camera per batch element.
/// * `near` - Near depths per pixel, `[B, 1, S, S]`.
/// * `far` - Far depths per pixel, `[B, 1, S, S]`.
///
/// ## Shapes
///
/// * `output.0` - World positions as `(x, y, z)`, `[B, 3, D, S, S]`
/// * `output.1` - Depths, `[B, 1, D, S, S]`
///
/// ## Details
///
/// The pixel `(u, v)` is at integer coordinates of the image resized to `S`.
/// The depths are evenly spaced from `near` to `far` inclusively, and
/// the positions are unprojected through the scaled camera.
///
/// # Panics
///
/// If any camera has singular intrinsics.
pub fn frustum_volume<B: Backend>(
    depth_count: usize,
    volume_size: usize,
    input_size: usize,
    cameras: &[&Camera],
    near: Tensor<B, 4>,
    far: Tensor<B, 4>,
) -> (Tensor<B, 5>, Tensor<B, 5>) {
    let device = near.device();
    let b = cameras.len();
    let (d, s) = (depth_count, volume_size);
    let pixel_count = s * s;
    assert_eq!(near.dims(), [b, 1, s, s], "near should be [B, 1, S, S]");
    assert_eq!(far.dims(), [b, 1, s, s], "far should be [B, 1, S, S]");

    let ratio = s as f64 / input_size as f64;
    let unprojections = matrices_to_tensor::<B>(
        cameras.iter().map(|camera| {
            camera
                .unprojection(ratio)
                .expect("The intrinsics should be invertible")
        }),
        &device,
    );

    // [1, 3, 1, S * S] as (u, v, 1)
    let pixels = {
        let mut pixels = vec![1.0_f32; 3 * pixel_count];
        for v in 0..s {
            for u in 0..s {
                pixels[v * s + u] = u as f32;
                pixels[pixel_count + v * s + u] = v as f32;
            }
        }
        Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [1, 3, 1, pixel_count]).convert::<B::FloatElem>(),
            &device,
        )
    };

    // [1, D, 1]
    let intervals = Tensor::<B, 3>::from_data(
        TensorData::new(
            linspace(0.0, 1.0, d).into_iter().map(|s| s as f32).collect(),
            [1, d, 1],
        )
        .convert::<B::FloatElem>(),
        &device,
    );

    // [B, D, S * S]
    let depths = near
        .reshape([b, 1, pixel_count])
        .mul(intervals.to_owned().neg().add_scalar(1.0))
        .add(far.reshape([b, 1, pixel_count]).mul(intervals));

    // [B, 3, D * S * S]
    let points = pixels
        .mul(depths.to_owned().reshape([b, 1, d, pixel_count]))
        .reshape([b, 3, d * pixel_count]);
    let positions = transform_points(unprojections, points).reshape([b, 3, d, s, s]);

    (positions, depths.reshape([b, 1, d, s, s]))
}

/// Near and far depths symmetric around `origin_depth`.
///
/// ## Shapes
///
/// * `output.0` - `[B, 1, S, S]` filled with `origin_depth - length`
/// * `output.1` - `[B, 1, S, S]` filled with `origin_depth + length`
pub fn frustum_bounds<B: Backend>(
    batch_size: usize,
    volume_size: usize,
    origin_depth: f64,
    length: f64,
    device: &B::Device,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let shape = [batch_size, 1, volume_size, volume_size];
    (
        Tensor::full(shape, origin_depth - length, device),
        Tensor::full(shape, origin_depth + length, device),
    )
}
