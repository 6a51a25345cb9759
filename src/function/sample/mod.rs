//! Grid sampling with linear interpolation.
//!
//! Both samplers align the corners, i.e., `-1` and `1` address the centers of
//! the first and last cells, and read zeros outside the input.

pub use burn::tensor::{backend::Backend, Int, Tensor};

/// Bilinear sampling.
///
/// ## Shapes
///
/// * `input` - `[N, C, H, W]`
/// * `grid` - `[N, P, 2]` as `(x, y)` in `[-1, 1]`
/// * `output` - `[N, C, P]`
pub fn grid_sample_2d<B: Backend>(
    input: Tensor<B, 4>,
    grid: Tensor<B, 3>,
) -> Tensor<B, 3> {
    let [n, c, h, w] = input.dims();
    let [n_grid, p, k] = grid.dims();
    assert_eq!(n, n_grid, "The batch sizes of input and grid should be equal");
    assert_eq!(k, 2, "The last dimension of grid should be 2");

    // [N * H * W, C]
    let values = input.permute([0, 2, 3, 1]).reshape([n * h * w, c]);
    let coordinates = [
        grid.to_owned().slice([0..n, 0..p, 0..1]).reshape([n, p]),
        grid.slice([0..n, 0..p, 1..2]).reshape([n, p]),
    ];

    sample_linear(values, coordinates, [w, h], n, p)
}

/// Trilinear sampling.
///
/// ## Shapes
///
/// * `input` - `[N, C, D, H, W]`
/// * `grid` - `[N, P, 3]` as `(x, y, z)` in `[-1, 1]`
/// * `output` - `[N, C, P]`
pub fn grid_sample_3d<B: Backend>(
    input: Tensor<B, 5>,
    grid: Tensor<B, 3>,
) -> Tensor<B, 3> {
    let [n, c, d, h, w] = input.dims();
    let [n_grid, p, k] = grid.dims();
    assert_eq!(n, n_grid, "The batch sizes of input and grid should be equal");
    assert_eq!(k, 3, "The last dimension of grid should be 3");

    // [N * D * H * W, C]
    let values = input.permute([0, 2, 3, 4, 1]).reshape([n * d * h * w, c]);
    let coordinates = [
        grid.to_owned().slice([0..n, 0..p, 0..1]).reshape([n, p]),
        grid.to_owned().slice([0..n, 0..p, 1..2]).reshape([n, p]),
        grid.slice([0..n, 0..p, 2..3]).reshape([n, p]),
    ];

    sample_linear(values, coordinates, [w, h, d], n, p)
}

/// Sampling `values` of `N` grids at `P` points per grid.
///
/// * `values` - `[N * S, C]`, cells in row-major order of `sizes` reversed
/// * `coordinates` - `[N, P]` per axis, innermost axis first
/// * `sizes` - Cell counts per axis, innermost axis first
/// * `output` - `[N, C, P]`
fn sample_linear<B: Backend, const K: usize>(
    values: Tensor<B, 2>,
    coordinates: [Tensor<B, 2>; K],
    sizes: [usize; K],
    n: usize,
    p: usize,
) -> Tensor<B, 3> {
    let device = values.device();
    let [_, c] = values.dims();
    let strides = sizes.iter().scan(1, |stride, &size| {
        let current = *stride;
        *stride *= size;
        Some(current)
    });
    let strides = strides.collect::<Vec<_>>();
    let cell_count = sizes.iter().product::<usize>();

    // (lower cell index, upper weight) per axis
    let axes = coordinates
        .into_iter()
        .zip(sizes)
        .map(|(coordinate, size)| {
            // [-1, 1] -> [0, size - 1]
            let position =
                coordinate.add_scalar(1.0).mul_scalar((size as f64 - 1.0) / 2.0);
            let lower = position.to_owned().detach().floor();
            let weight_upper = position - lower.to_owned();
            (lower, weight_upper, size)
        })
        .collect::<Vec<_>>();

    // [N, P]
    let offsets = Tensor::<B, 1, Int>::arange(0..n as i64, &device)
        .mul_scalar(cell_count as i64)
        .reshape([n, 1])
        .repeat_dim(1, p);

    let output = (0..1_usize << K)
        .map(|corner| {
            let (weight, index) = axes.iter().zip(&strides).enumerate().fold(
                (Tensor::<B, 2>::ones([n, p], &device), offsets.to_owned()),
                |(weight, index), (axis, ((lower, weight_upper, size), &stride))| {
                    let is_upper = (corner >> axis) & 1 == 1;
                    let (cell, weight_axis) = if is_upper {
                        (lower.to_owned().add_scalar(1.0), weight_upper.to_owned())
                    } else {
                        (lower.to_owned(), weight_upper.to_owned().neg().add_scalar(1.0))
                    };
                    let limit = (*size - 1) as f64;
                    let is_inside = cell
                        .to_owned()
                        .greater_equal_elem(0.0)
                        .float()
                        .mul(cell.to_owned().lower_equal_elem(limit).float());
                    let cell = cell.clamp(0.0, limit).int();

                    (
                        weight * weight_axis * is_inside,
                        index + cell.mul_scalar(stride as i64),
                    )
                },
            );

            // [N, P, C]
            values
                .to_owned()
                .select(0, index.reshape([n * p]))
                .reshape([n, p, c])
                .mul(weight.unsqueeze_dim(2))
        })
        .reduce(|output, sample| output + sample)
        .expect("There is at least one corner");

    output.swap_dims(1, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type B = NdArray<f32>;

    fn assert_close(
        output: Tensor<B, 3>,
        target: &[f32],
    ) {
        let output = output.into_data().to_vec::<f32>().unwrap();
        assert_eq!(output.len(), target.len());
        output.iter().zip(target).for_each(|(output, target)| {
            assert!((output - target).abs() < 1e-5, "{output} != {target}");
        });
    }

    #[test]
    fn grid_sample_2d_corners_and_center() {
        let device = &Default::default();

        // [1, 1, 2, 3]
        let input = Tensor::<B, 4>::from_floats(
            [[[[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]]],
            device,
        );
        let grid = Tensor::<B, 3>::from_floats(
            [[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [0.0, 0.0], [-0.5, 1.0]]],
            device,
        );
        let output = grid_sample_2d(input, grid);
        assert_eq!(output.dims(), [1, 1, 5]);
        assert_close(output, &[0.0, 2.0, 5.0, 2.5, 3.5]);
    }

    #[test]
    fn grid_sample_2d_zero_padding() {
        let device = &Default::default();

        let input = Tensor::<B, 4>::ones([1, 2, 4, 4], device);
        let grid = Tensor::<B, 3>::from_floats(
            [[[3.0, 0.0], [0.0, -5.0], [1.0 + 1.0 / 3.0, 0.0]]],
            device,
        );
        let output = grid_sample_2d(input, grid);
        assert_eq!(output.dims(), [1, 2, 3]);
        // The last point lies half a cell outside
        assert_close(output, &[0.0, 0.0, 0.5, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn grid_sample_2d_batches_are_independent() {
        let device = &Default::default();

        let input = Tensor::<B, 4>::from_floats(
            [[[[1.0, 1.0], [1.0, 1.0]]], [[[2.0, 2.0], [2.0, 2.0]]]],
            device,
        );
        let grid = Tensor::<B, 3>::zeros([2, 1, 2], device);
        let output = grid_sample_2d(input, grid);
        assert_close(output, &[1.0, 2.0]);
    }

    #[test]
    fn grid_sample_3d_is_trilinear() {
        let device = &Default::default();

        // value = x + 2y + 4z at cell (z, y, x)
        let input = Tensor::<B, 5>::from_data(
            TensorData::new(
                (0..8).map(|i| i as f32).collect::<Vec<_>>(),
                [1, 1, 2, 2, 2],
            ),
            device,
        );
        let grid = Tensor::<B, 3>::from_floats(
            [[
                [-1.0, -1.0, -1.0],
                [1.0, -1.0, -1.0],
                [-1.0, 1.0, -1.0],
                [-1.0, -1.0, 1.0],
                [0.0, 0.0, 0.0],
                [0.5, -1.0, 1.0],
            ]],
            device,
        );
        let output = grid_sample_3d(input, grid);
        assert_eq!(output.dims(), [1, 1, 6]);
        assert_close(output, &[0.0, 1.0, 2.0, 4.0, 3.5, 4.75]);
    }

    #[test]
    fn grid_sample_3d_multiple_channels() {
        let device = &Default::default();

        let input = Tensor::<B, 5>::ones([1, 3, 4, 4, 4], device)
            .mul(Tensor::<B, 1>::from_floats([1.0, 2.0, 3.0], device).reshape([1, 3, 1, 1, 1]));
        let grid = Tensor::<B, 3>::from_floats([[[0.1, -0.2, 0.3], [2.0, 0.0, 0.0]]], device);
        let output = grid_sample_3d(input, grid);
        assert_eq!(output.dims(), [1, 3, 2]);
        assert_close(output, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn grid_sample_3d_gradient_flows_to_input() {
        use crate::preset::backend::Autodiff;

        type AB = Autodiff<B>;
        let device = &Default::default();

        let input = Tensor::<AB, 5>::ones([1, 1, 2, 2, 2], device).require_grad();
        let grid = Tensor::<AB, 3>::zeros([1, 1, 3], device);
        let grads = grid_sample_3d(input.to_owned(), grid).sum().backward();
        let input_grad = input.grad(&grads).unwrap();

        input_grad
            .into_data()
            .assert_eq(&Tensor::<B, 5>::full([1, 1, 2, 2, 2], 0.125, device).into_data(), true);
    }
}
