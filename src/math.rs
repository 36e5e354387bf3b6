use crate::my_types::*;

/// Smallest eigenvalue of a symmetric 2x2 matrix, closed form.
pub fn min_eigenvalue(m: &Matrix2d) -> f64 {
    let half_trace = 0.5 * (m[(0, 0)] + m[(1, 1)]);
    let half_diff = 0.5 * (m[(0, 0)] - m[(1, 1)]);
    half_trace - (half_diff * half_diff + m[(0, 1)] * m[(1, 0)]).sqrt()
}

/// |dx| + |dy|
pub fn manhattan(a: &Vector2d, b: &Vector2d) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}
