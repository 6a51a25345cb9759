//! Relative viewpoint embeddings.

pub use super::CameraRig;
pub use burn::tensor::{backend::Backend, Tensor, TensorData};

use crate::preset::volume::{ELEVATION_TARGET, VIEWPOINT_DIM};

impl CameraRig {
    /// The viewpoint embedding of every (reference, target) view pair.
    ///
    /// ## Shapes
    ///
    /// * `elevations_ref` - `[B]` in radians
    /// * `output` - `[B, N, 4]`
    ///
    /// ## Details
    ///
    /// Each entry is `(Δe, sin(Δa), cos(Δa), 0)`, where
    /// `Δa` is the azimuth relative to the first view, and
    /// `Δe = ELEVATION_TARGET + elevation_ref` since the elevations are negated.
    pub fn viewpoint_embedding<B: Backend>(
        &self,
        elevations_ref: Tensor<B, 1>,
    ) -> Tensor<B, 3> {
        let device = elevations_ref.device();
        let [batch_size] = elevations_ref.dims();
        let view_count = self.view_count();
        let azimuth_ref = self.azimuths()[0];

        // [1, N, 3]
        let azimuths = Tensor::<B, 3>::from_data(
            TensorData::new(
                self.azimuths()
                    .iter()
                    .flat_map(|&azimuth| {
                        let d_a = azimuth - azimuth_ref;
                        [d_a.sin() as f32, d_a.cos() as f32, 0.0]
                    })
                    .collect(),
                [1, view_count, VIEWPOINT_DIM - 1],
            )
            .convert::<B::FloatElem>(),
            &device,
        );

        // [B, N, 1] <- ELEVATION_TARGET - (-elevation_ref)
        let elevations = elevations_ref
            .add_scalar(ELEVATION_TARGET)
            .reshape([batch_size, 1, 1])
            .repeat_dim(1, view_count);

        Tensor::cat(vec![elevations, azimuths.repeat_dim(0, batch_size)], 2)
    }
}
