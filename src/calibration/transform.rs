use crate::error::{ProcessingError, Result};
use nalgebra::{DMatrix, Matrix3x4, Vector4};
use palette::{LinSrgb, Srgb};

/// Singular values below this make the least-squares system degenerate
const RANK_EPSILON: f64 = 1e-9;

/// Affine color transform acting on linear sRGB.
///
/// Each output channel is `m[c][0] * r + m[c][1] * g + m[c][2] * b + m[c][3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    matrix: Matrix3x4<f64>,
}

impl ColorTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3x4::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix3x4<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3x4<f64> {
        &self.matrix
    }

    /// Least-squares fit of `(measured, reference)` pairs, minimizing squared
    /// linear-RGB error of the mapped measured colors.
    pub fn fit(pairs: &[(Srgb, Srgb)]) -> Result<Self> {
        if pairs.len() < 4 {
            return Err(ProcessingError::unexpected(format!(
                "affine color fit needs at least 4 samples, got {}",
                pairs.len()
            )));
        }

        let sources: Vec<[f64; 3]> = pairs.iter().map(|(m, _)| to_linear(*m)).collect();
        let targets: Vec<[f64; 3]> = pairs.iter().map(|(_, r)| to_linear(*r)).collect();

        let a = DMatrix::<f64>::from_fn(pairs.len(), 4, |i, j| {
            if j == 3 { 1.0 } else { sources[i][j] }
        });
        let b = DMatrix::<f64>::from_fn(pairs.len(), 3, |i, j| targets[i][j]);

        let svd = a.svd(true, true);
        if svd.rank(RANK_EPSILON) < 4 {
            return Err(ProcessingError::unexpected(
                "color samples are degenerate, cannot fit transform",
            ));
        }
        let solution = svd
            .solve(&b, RANK_EPSILON)
            .map_err(|e| ProcessingError::unexpected(format!("color fit failed: {e}")))?;

        let matrix = Matrix3x4::from_fn(|row, col| solution[(col, row)]);
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(ProcessingError::unexpected("color fit produced non-finite coefficients"));
        }

        Ok(Self { matrix })
    }

    /// Map a linear RGB triple, without clamping
    pub fn map_linear(&self, rgb: [f64; 3]) -> [f64; 3] {
        let out = self.matrix * Vector4::new(rgb[0], rgb[1], rgb[2], 1.0);
        [out[0], out[1], out[2]]
    }

    /// Map an sRGB color, clamping the result to the displayable range
    pub fn map(&self, color: Srgb) -> Srgb {
        from_linear(self.map_linear(to_linear(color)))
    }
}

pub(crate) fn to_linear(color: Srgb) -> [f64; 3] {
    let lin: LinSrgb = color.into_linear();
    [lin.red as f64, lin.green as f64, lin.blue as f64]
}

/// Clamp linear channels to [0, 1] and encode back to sRGB
pub(crate) fn from_linear(rgb: [f64; 3]) -> Srgb {
    let [r, g, b] = rgb.map(|v| v.clamp(0.0, 1.0) as f32);
    Srgb::from_linear(LinSrgb::new(r, g, b))
}
