//! Camera geometry on tensors.
//!
//! Nothing here has learned parameters.

pub mod frustum;
pub mod grid;
pub mod warp;

pub use crate::camera::Camera;
pub use burn::tensor::{backend::Backend, Tensor, TensorData};
pub use frustum::*;
pub use grid::*;
pub use warp::*;

/// Stacking per-camera `3 x 4` matrices.
///
/// ## Shapes
///
/// * `output` - `[B, 3, 4]`
pub(crate) fn matrices_to_tensor<B: Backend>(
    matrices: impl IntoIterator<Item = [[f64; 4]; 3]>,
    device: &B::Device,
) -> Tensor<B, 3> {
    let values = matrices
        .into_iter()
        .flatten()
        .flatten()
        .map(|value| value as f32)
        .collect::<Vec<_>>();
    let count = values.len() / 12;

    Tensor::from_data(
        TensorData::new(values, [count, 3, 4]).convert::<B::FloatElem>(),
        device,
    )
}

/// Applying `3 x 4` affine transformations to points.
///
/// ## Shapes
///
/// * `transforms` - `[B, 3, 4]`
/// * `points` - `[B, 3, P]`
/// * `output` - `[B, 3, P]`
pub(crate) fn transform_points<B: Backend>(
    transforms: Tensor<B, 3>,
    points: Tensor<B, 3>,
) -> Tensor<B, 3> {
    let [b, _, _] = transforms.dims();
    let linear = transforms.to_owned().slice([0..b, 0..3, 0..3]);
    let translation = transforms.slice([0..b, 0..3, 3..4]);

    linear.matmul(points) + translation
}
