pub mod rig;
pub mod viewpoint;

pub use rig::*;
pub use viewpoint::*;

use crate::error::Error;

/// A pinhole camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Intrinsic matrix in pixel space.
    ///
    /// It is in **row-major order**, i.e., `K[row][col]`.
    ///
    /// # Format
    ///
    /// ```plaintext
    /// [f_x  0   c_x]
    /// [0    f_y c_y]
    /// [0    0   1  ]
    /// ```
    pub intrinsics: [[f64; 3]; 3],
    /// Rigid transformation from world space to camera space.
    ///
    /// It is in **row-major order**, i.e., `M[row][col]`.
    ///
    /// # Format
    ///
    /// ```plaintext
    /// [R | t]
    /// ```
    pub extrinsics: [[f64; 4]; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            intrinsics: IDENTITY_3,
            extrinsics: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }
}

const IDENTITY_3: [[f64; 3]; 3] =
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Matrix views.
impl Camera {
    /// The rotation block of [`Self::extrinsics`].
    #[inline]
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let e = &self.extrinsics;
        [
            [e[0][0], e[0][1], e[0][2]],
            [e[1][0], e[1][1], e[1][2]],
            [e[2][0], e[2][1], e[2][2]],
        ]
    }

    /// The translation column of [`Self::extrinsics`].
    #[inline]
    pub fn translation(&self) -> [f64; 3] {
        let e = &self.extrinsics;
        [e[0][3], e[1][3], e[2][3]]
    }

    /// The intrinsics of the image resized by `ratio`.
    ///
    /// `diag(ratio, ratio, 1) * K`
    pub fn intrinsics_scaled(
        &self,
        ratio: f64,
    ) -> [[f64; 3]; 3] {
        let mut k = self.intrinsics;
        k[..2].iter_mut().flatten().for_each(|k| *k *= ratio);
        k
    }

    /// Projection from world space to pixel space of the image resized by `ratio`.
    ///
    /// `diag(ratio, ratio, 1) * K * [R | t]`
    pub fn projection(
        &self,
        ratio: f64,
    ) -> [[f64; 4]; 3] {
        let k = self.intrinsics_scaled(ratio);
        let e = &self.extrinsics;
        let mut p = [[0.0; 4]; 3];
        for row in 0..3 {
            for col in 0..4 {
                p[row][col] = (0..3).map(|i| k[row][i] * e[i][col]).sum();
            }
        }
        p
    }

    /// Unprojection from homogeneous pixel space (scaled by depth) to world space
    /// of the image resized by `ratio`.
    ///
    /// `[R^T * (diag(ratio, ratio, 1) * K)^-1 | -R^T * t]`
    ///
    /// Returns `None` if the intrinsics are singular.
    pub fn unprojection(
        &self,
        ratio: f64,
    ) -> Option<[[f64; 4]; 3]> {
        let k_inv = invert_3(&self.intrinsics_scaled(ratio))?;
        let r = self.rotation();
        let t = self.translation();
        let mut m = [[0.0; 4]; 3];
        for row in 0..3 {
            for col in 0..3 {
                m[row][col] = (0..3).map(|i| r[i][row] * k_inv[i][col]).sum();
            }
            m[row][3] = -(0..3).map(|i| r[i][row] * t[i]).sum::<f64>();
        }
        Some(m)
    }

    /// Position in world space.
    ///
    /// `-R^T * t`
    pub fn position(&self) -> [f64; 3] {
        let r = self.rotation();
        let t = self.translation();
        [0, 1, 2].map(|col| -(0..3).map(|i| r[i][col] * t[i]).sum::<f64>())
    }
}

/// Validations.
impl Camera {
    /// Checking the camera invariants.
    ///
    /// `index` is only used for the error.
    pub fn validate(
        &self,
        index: usize,
    ) -> Result<&Self, Error> {
        const TOLERANCE: f64 = 1e-3;

        if invert_3(&self.intrinsics).is_none() {
            return Err(Error::SingularIntrinsics(index));
        }

        let r = self.rotation();
        let is_orthonormal = (0..3).all(|a| {
            (0..3).all(|b| {
                let dot = (0..3).map(|i| r[a][i] * r[b][i]).sum::<f64>();
                let target = if a == b { 1.0 } else { 0.0 };
                (dot - target).abs() <= TOLERANCE
            })
        });
        if !is_orthonormal {
            return Err(Error::NonRigidExtrinsics(index));
        }

        Ok(self)
    }
}

/// Inverse of a 3x3 matrix by cofactors.
pub(crate) fn invert_3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
    let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
    let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
    let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
    if det.abs() <= f64::EPSILON || !det.is_finite() {
        return None;
    }
    let d = det.recip();
    Some([
        [
            c00 * d,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * d,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * d,
        ],
        [
            c01 * d,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * d,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * d,
        ],
        [
            c02 * d,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * d,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * d,
        ],
    ])
}
