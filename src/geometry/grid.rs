//! Canonical voxel grid.

pub use super::*;

/// Evenly spaced values from `start` to `end` inclusively.
pub fn linspace(
    start: f64,
    end: f64,
    count: usize,
) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![start],
        _ => (0..count)
            .map(|index| {
                let s = index as f64 / (count - 1) as f64;
                start * (1.0 - s) + end * s
            })
            .collect(),
    }
}

/// World positions of the `V^3` voxels spanning `[-length, length]^3`.
///
/// ## Shapes
///
/// * `output` - `[1, 3, V, V, V]`
///
/// ## Details
///
/// The channels are `(x, y, z)`, and the voxel axes are `(z, y, x)`,
/// i.e., (depth, height, width).
pub fn spatial_grid<B: Backend>(
    size: usize,
    length: f64,
    device: &B::Device,
) -> Tensor<B, 5> {
    let values = linspace(-length, length, size);
    let cell_count = size * size * size;

    let mut grid = vec![0.0_f32; 3 * cell_count];
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let cell = (z * size + y) * size + x;
                grid[cell] = values[x] as f32;
                grid[cell_count + cell] = values[y] as f32;
                grid[2 * cell_count + cell] = values[z] as f32;
            }
        }
    }

    Tensor::from_data(
        TensorData::new(grid, [1, 3, size, size, size]).convert::<B::FloatElem>(),
        device,
    )
}
