//! Construction-time errors.
//!
//! Forward passes never return these. Malformed tensors fail inside the runtime.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Non-rigid extrinsics at view {0}: the rotation block should be orthonormal")]
    NonRigidExtrinsics(usize),

    #[error("Singular intrinsics at view {0}")]
    SingularIntrinsics(usize),

    #[error("Validation Error: {0} should be {1}")]
    Validation(String, String),
}
