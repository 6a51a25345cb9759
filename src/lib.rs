#![allow(clippy::excessive_precision)]
#![allow(clippy::too_many_arguments)]

pub mod camera;
pub mod diffusion;
pub mod error;
pub mod function;
pub mod geometry;
pub mod network;
pub mod preset;
pub mod volume;

pub use error::Error;
