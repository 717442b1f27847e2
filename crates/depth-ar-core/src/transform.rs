//! 4x4 homogeneous transforms between 3D coordinate frames and their
//! least-squares estimation from point correspondences.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Minimum number of correspondences accepted by [`fit_affine_transform`].
pub const MIN_CORRESPONDENCES: usize = 4;

/// Spread directions weaker than this fraction of the dominant one are
/// treated as absent (flat marker samples carry depth noise only).
const PLANAR_RATIO: f64 = 1e-2;

/// Homogeneous 3D transform, `p_dst ~ M * p_src`.
///
/// Serialized as four row-major rows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct Transform3 {
    pub m: Matrix4<f64>,
}

impl Transform3 {
    pub fn new(m: Matrix4<f64>) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self::new(Matrix4::identity())
    }

    pub fn from_array(rows: [[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[(r, c)] = *v;
            }
        }
        Self::new(m)
    }

    pub fn to_array(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.m[(r, c)];
            }
        }
        rows
    }

    /// Reflection through the `z = 0` plane.
    pub fn flip_z() -> Self {
        Self::new(Matrix4::from_diagonal(&Vector4::new(1.0, 1.0, -1.0, 1.0)))
    }

    /// `self` applied after `first`.
    pub fn compose(&self, first: &Transform3) -> Self {
        Self::new(self.m * first.m)
    }

    /// Map a point, normalizing by the homogeneous component.
    ///
    /// Returns `None` when the homogeneous component vanishes or the result is
    /// not finite.
    #[inline]
    pub fn apply(&self, p: Point3<f32>) -> Option<Point3<f32>> {
        let v = self.m * Vector4::new(p.x as f64, p.y as f64, p.z as f64, 1.0);
        let w = v[3];
        if !w.is_finite() || w.abs() < 1e-12 {
            return None;
        }
        let out = Point3::new((v[0] / w) as f32, (v[1] / w) as f32, (v[2] / w) as f32);
        out.iter().all(|c| c.is_finite()).then_some(out)
    }

    /// Root-mean-square distance between `M * src[i]` and `dst[i]`.
    pub fn rms_error(&self, src: &[Point3<f32>], dst: &[Point3<f32>]) -> Option<f64> {
        if src.len() != dst.len() || src.is_empty() {
            return None;
        }
        let mut sum = 0.0;
        for (s, d) in src.iter().zip(dst) {
            let p = self.apply(*s)?;
            sum += (p - *d).cast::<f64>().norm_squared();
        }
        Some((sum / src.len() as f64).sqrt())
    }
}

impl From<[[f64; 4]; 4]> for Transform3 {
    fn from(rows: [[f64; 4]; 4]) -> Self {
        Self::from_array(rows)
    }
}

impl From<Transform3> for [[f64; 4]; 4] {
    fn from(t: Transform3) -> Self {
        t.to_array()
    }
}

/// Reasons a transform cannot be estimated from a correspondence set.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformFitError {
    #[error("need at least {min} correspondences, got {got}")]
    TooFewPoints { got: usize, min: usize },
    #[error("source and destination differ in length ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("non-finite coordinate in correspondence {index}")]
    NonFinite { index: usize },
    #[error("degenerate correspondence set (spatial rank {rank}, need >= 2)")]
    Degenerate { rank: usize },
    #[error("least-squares solve failed: {0}")]
    Solve(&'static str),
}

/// Centroid and isotropic scale (mean distance -> sqrt(3)) of a point set.
fn centroid_and_scale(pts: &[Point3<f32>]) -> (Vector3<f64>, f64) {
    let n = pts.len() as f64;
    let mut c = Vector3::zeros();
    for p in pts {
        c += p.coords.cast::<f64>();
    }
    c /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        mean_dist += (p.coords.cast::<f64>() - c).norm();
    }
    mean_dist /= n;

    let s = if mean_dist > 1e-12 {
        (3.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };
    (c, s)
}

fn normalized_rows(pts: &[Point3<f32>], c: &Vector3<f64>, s: f64) -> DMatrix<f64> {
    DMatrix::from_fn(pts.len(), 3, |r, k| (pts[r][k] as f64 - c[k]) * s)
}

/// Least-squares affine fit `dst ~ M * src` over `N >= 4` correspondences.
///
/// Both point sets are centered and scaled before the solve. When either set
/// is (nearly) coplanar, only the in-plane part is fitted: source points are
/// expressed in their two dominant spread directions, so noise along the
/// source normal cannot leak into the result. The source normal is then
/// mapped onto the normal of the fitted destination plane with the mean
/// in-plane scale, keeping the result a full-rank, orientation-preserving 3D
/// map. Otherwise the full 3x3 linear part is solved directly.
///
/// No outlier rejection is performed.
pub fn fit_affine_transform(
    src: &[Point3<f32>],
    dst: &[Point3<f32>],
) -> Result<Transform3, TransformFitError> {
    if src.len() != dst.len() {
        return Err(TransformFitError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < MIN_CORRESPONDENCES {
        return Err(TransformFitError::TooFewPoints {
            got: src.len(),
            min: MIN_CORRESPONDENCES,
        });
    }
    if let Some(index) = src
        .iter()
        .zip(dst)
        .position(|(s, d)| !s.iter().chain(d.iter()).all(|c| c.is_finite()))
    {
        return Err(TransformFitError::NonFinite { index });
    }

    let (c_src, s_src) = centroid_and_scale(src);
    let (c_dst, s_dst) = centroid_and_scale(dst);
    let x = normalized_rows(src, &c_src, s_src);
    let y = normalized_rows(dst, &c_dst, s_dst);

    let svd = x.clone().svd(true, true);
    let sv = &svd.singular_values;
    let sigma_max = sv.max();
    if sigma_max <= 1e-12 {
        return Err(TransformFitError::Degenerate { rank: 0 });
    }
    let eps = sigma_max * PLANAR_RATIO;
    let rank = sv.iter().filter(|&&v| v >= eps).count();
    if rank < 2 {
        return Err(TransformFitError::Degenerate { rank });
    }
    let dst_sv = y.singular_values();
    let planar = rank == 2 || dst_sv.min() < dst_sv.max() * PLANAR_RATIO;

    let ln = if planar {
        let v_t = svd
            .v_t
            .as_ref()
            .ok_or(TransformFitError::Solve("missing right singular vectors"))?;
        plane_to_plane(&x, &y, v_t, sv.imin())?
    } else {
        // Solve X * L^T = Y for the normalized linear part.
        let lt = svd.solve(&y, eps).map_err(TransformFitError::Solve)?;
        Matrix3::from_fn(|r, c| lt[(c, r)])
    };

    // y = c_dst + (s_src / s_dst) * Ln * (x - c_src)
    let lin = ln * (s_src / s_dst);
    let t = c_dst - lin * c_src;

    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&lin);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);

    if !m.iter().all(|v| v.is_finite()) {
        return Err(TransformFitError::Solve("non-finite transform"));
    }
    Ok(Transform3::new(m))
}

/// Normalized linear part for coplanar correspondences.
///
/// `v_t` holds the source's right singular vectors; the row at `normal_idx`
/// is the direction of least spread and is left out of the fit.
fn plane_to_plane(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    v_t: &DMatrix<f64>,
    normal_idx: usize,
) -> Result<Matrix3<f64>, TransformFitError> {
    let mut axes = (0..3)
        .filter(|&i| i != normal_idx)
        .map(|i| Vector3::new(v_t[(i, 0)], v_t[(i, 1)], v_t[(i, 2)]));
    let (u1, u2) = match (axes.next(), axes.next()) {
        (Some(u1), Some(u2)) => (u1, u2),
        _ => return Err(TransformFitError::Degenerate { rank: 1 }),
    };

    // In-plane coordinates, then P * A^T = Y with A the 3x2 in-plane map.
    let basis = DMatrix::from_columns(&[
        DVector::from_column_slice(u1.as_slice()),
        DVector::from_column_slice(u2.as_slice()),
    ]);
    let p = x * basis;
    let at = p
        .svd(true, true)
        .solve(y, 1e-12)
        .map_err(TransformFitError::Solve)?;
    let a1 = Vector3::new(at[(0, 0)], at[(0, 1)], at[(0, 2)]);
    let a2 = Vector3::new(at[(1, 0)], at[(1, 1)], at[(1, 2)]);

    let mapped_normal = a1.cross(&a2);
    let area = mapped_normal.norm();
    if area <= 1e-12 {
        return Err(TransformFitError::Degenerate { rank: 1 });
    }
    let n_src = u1.cross(&u2);
    let n_dst = mapped_normal / area;
    Ok(a1 * u1.transpose() + a2 * u2.transpose() + n_dst * n_src.transpose() * area.sqrt())
}
