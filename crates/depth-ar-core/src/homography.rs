use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

/// Planar projective transform, `p_img ~ H * p_marker`.
///
/// Serialized as three row-major rows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        std::array::from_fn(|r| std::array::from_fn(|c| self.h[(r, c)]))
    }

    /// Map a marker-plane point into the image (homogeneous divide included).
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.h * Point2::new(p.x as f64, p.y as f64).to_homogeneous();
        Point2::new((q.x / q.z) as f32, (q.y / q.z) as f32)
    }

    /// Apply to every point, preserving order.
    pub fn apply_all(&self, pts: &[Point2<f32>]) -> Vec<Point2<f32>> {
        pts.iter().map(|&p| self.apply(p)).collect()
    }

    /// Image -> marker map; `None` when singular.
    pub fn inverse(&self) -> Option<Self> {
        Some(Self::new(self.h.try_inverse()?))
    }

    /// `false` for singular or non-finite matrices.
    pub fn is_valid(&self) -> bool {
        self.h.iter().all(|v| v.is_finite()) && self.h.determinant().abs() > 1e-12
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(rows: [[f64; 3]; 3]) -> Self {
        Self::from_array(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_array()
    }
}

/// Projective map taking the unit square `(0,0), (1,0), (1,1), (0,1)` onto
/// `quad` (same order), in closed form.
///
/// `None` when three of the corners are collinear.
fn unit_square_to_quad(quad: &[Point2<f32>; 4]) -> Option<Matrix3<f64>> {
    let [x0, x1, x2, x3] = quad.map(|p| p.x as f64);
    let [y0, y1, y2, y3] = quad.map(|p| p.y as f64);

    let sx = x0 - x1 + x2 - x3;
    let sy = y0 - y1 + y2 - y3;
    let (dx1, dx2) = (x1 - x2, x3 - x2);
    let (dy1, dy2) = (y1 - y2, y3 - y2);
    let den = dx1 * dy2 - dx2 * dy1;
    if den.abs() <= f64::EPSILON * (dx1.abs() + dx2.abs()) * (dy1.abs() + dy2.abs()) {
        return None;
    }

    // Zero for a parallelogram, which leaves a pure affine map.
    let g = (sx * dy2 - dx2 * sy) / den;
    let h = (dx1 * sy - sx * dy1) / den;
    let m = Matrix3::new(
        x1 - x0 + g * x1, x3 - x0 + h * x3, x0, //
        y1 - y0 + g * y1, y3 - y0 + h * y3, y0, //
        g, h, 1.0,
    );
    (m.iter().all(|v| v.is_finite()) && m.determinant().abs() > 1e-12).then_some(m)
}

/// Homography with `dst ~ H * src` from four corner correspondences.
///
/// `src` is usually the marker rectangle in its own working units and `dst`
/// the detected image corners; both must list corners in the same order
/// around the quad. Both quads are mapped from the unit square and the two
/// maps are chained. Returns `None` for degenerate quads.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let to_src = unit_square_to_quad(src)?;
    let to_dst = unit_square_to_quad(dst)?;
    let h = to_dst * to_src.try_inverse()?;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Camera looking at a 400x250 marker slightly from the side.
    fn oblique_view() -> Homography {
        Homography::from_array([
            [0.8, 0.05, 120.0],
            [-0.02, 1.1, 80.0],
            [0.0009, -0.0004, 1.0],
        ])
    }

    fn marker() -> [Point2<f32>; 4] {
        [[0.0, 0.0], [400.0, 0.0], [400.0, 250.0], [0.0, 250.0]].map(|[x, y]| Point2::new(x, y))
    }

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        assert!((a - b).norm() < tol, "{a:?} vs {b:?} (tol {tol})");
    }

    #[test]
    fn image_points_map_back_onto_the_marker() {
        let h = oblique_view();
        let back = h.inverse().expect("invertible");
        for p in [Point2::new(12.5_f32, 7.0), Point2::new(200.0, 125.0), marker()[2]] {
            assert_close(back.apply(h.apply(p)), p, 1e-3);
        }
    }

    #[test]
    fn corners_determine_the_homography() {
        let truth = oblique_view();
        let corners = marker().map(|p| truth.apply(p));
        let fitted = homography_from_4pt(&marker(), &corners).expect("non-degenerate quad");
        for p in [Point2::new(30.0_f32, 210.0), Point2::new(333.0, 17.0)] {
            assert_close(fitted.apply(p), truth.apply(p), 1e-2);
        }
    }

    #[test]
    fn parallelogram_gives_affine_map() {
        let corners = marker().map(|p| Point2::new(0.5 * p.x + 0.1 * p.y + 40.0, 0.5 * p.y + 25.0));
        let h = homography_from_4pt(&marker(), &corners).expect("affine quad");
        let [_, _, last] = h.to_array();
        assert!(last[0].abs() < 1e-12 && last[1].abs() < 1e-12);
        assert!((last[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_not_valid() {
        let h = Homography::from_array([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        assert!(!h.is_valid());
        assert!(h.inverse().is_none());
        assert!(Homography::identity().is_valid());
    }

    #[test]
    fn serializes_as_row_major_rows() {
        let h = Homography::from_array([[2.0, 0.0, 10.0], [0.0, 3.0, 20.0], [0.0, 0.0, 1.0]]);
        let json = serde_json::to_string(&h).expect("serialize");
        assert_eq!(json, "[[2.0,0.0,10.0],[0.0,3.0,20.0],[0.0,0.0,1.0]]");
        let back: Homography = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, h);
    }
}
