//! Learned networks of the volume conditioning.

pub mod block;
pub mod embedding;
pub mod encoder;
pub mod frustum;
pub mod spatial;

pub use crate::preset::volume::*;
pub use block::*;
pub use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor, TensorData},
};
pub use embedding::*;
pub use encoder::*;
pub use frustum::*;
pub use spatial::*;
