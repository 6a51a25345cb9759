pub use burn::{
    backend::wgpu::{WgpuDevice, WgpuRuntime},
    tensor::backend::Backend,
};

use burn::backend::autodiff;

pub type Autodiff<B> = autodiff::Autodiff<B>;
pub type Wgpu = burn_jit::JitBackend<WgpuRuntime, f32, i32, u32>;

#[cfg(test)]
mod tests {
    #[test]
    fn backends() {
        use super::*;

        fn backend<B: Backend>() {}

        backend::<Wgpu>();
        backend::<Autodiff<Wgpu>>();
    }
}
