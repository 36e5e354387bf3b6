use anyhow::Result;
use nalgebra as na;

use crate::config::Config;
use crate::frame::Frame;
use crate::image::*;
use crate::math::min_eigenvalue;
use crate::my_types::*;

type Range = [[i16; 2]; 2];

/// Output of one tracking step, index-aligned with the input points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackResult {
    pub points: Vec<Vector2d>,
    pub status: Vec<bool>,
    pub errors: Vec<f64>,
}

impl TrackResult {
    pub fn with_capacity(n: usize) -> Self {
        TrackResult {
            points: Vec::with_capacity(n),
            status: Vec::with_capacity(n),
            errors: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, point: Vector2d, status: bool, error: f64) {
        self.points.push(point);
        self.status.push(status);
        self.errors.push(error);
    }
}

/// Advances points from one frame to the next.
pub trait PointTracker {
    fn track(&mut self, frame0: &Frame, frame1: &Frame, points0: &[Vector2d]) -> Result<TrackResult>;
}

/// Pyramidal Lucas-Kanade tracker.
pub struct OpticalFlow {
    lk_iters: usize,
    lk_levels: usize,
    lk_win_size: usize,
    lk_term: f64,
    lk_min_eig: f64,
    ix: Matrixd,
    iy: Matrixd,
    it: Matrixd,
    grid: Matrixd,
}

impl OpticalFlow {
    pub fn new(config: &Config) -> OpticalFlow {
        let lk_win_size = config.lk_win_size;
        OpticalFlow {
            lk_iters: config.lk_iters,
            lk_levels: config.lk_levels,
            lk_win_size,
            lk_term: config.lk_term,
            lk_min_eig: config.lk_min_eig,
            ix: na::DMatrix::zeros(lk_win_size, lk_win_size),
            iy: na::DMatrix::zeros(lk_win_size, lk_win_size),
            it: na::DMatrix::zeros(lk_win_size, lk_win_size),
            grid: na::DMatrix::zeros(lk_win_size, lk_win_size),
        }
    }

    /// ref http://robots.stanford.edu/cs223b04/algo_tracking.pdf
    ///
    /// Returns the tracked position and the mean absolute intensity residual
    /// over the window at full resolution.
    fn process_feature(
        &mut self,
        frame0: &Frame,
        frame1: &Frame,
        point0: Vector2d,
        levels: usize,
    ) -> Option<(Vector2d, f64)> {
        let lk_term2 = self.lk_term.powi(2);
        let r = (self.lk_win_size - 1) / 2;

        let mut g = Vector2d::zeros();
        let mut d = Vector2d::zeros();
        let mut residual = 0.;
        for level in (0..levels + 1).rev() {
            let level0 = frame0.get_image_at_level(level);
            let level1 = frame1.get_image_at_level(level);
            let u = point0 / u32::pow(2, level as u32) as f64;
            let range = integration_range(level0, u, r, 1)?;
            // compute the derivative
            scharr(level0, u, range, &mut self.ix, &mut self.iy, &mut self.grid);
            let gradient = spatial_gradient(&self.ix, &self.iy);
            if min_eigenvalue(&gradient) < self.lk_min_eig {
                return None;
            }
            let mut nu = Vector2d::zeros();
            for _ in 0..self.lk_iters {
                image_difference(range, &self.grid, &mut self.it, level1, u + g + nu)?;
                let eta = flow_vector(&gradient, &self.ix, &self.iy, &self.it)?;
                nu += eta;
                if eta.norm_squared() < lk_term2 {
                    break;
                }
            }
            if !nu.iter().all(|v| v.is_finite()) {
                return None;
            }

            d = nu;
            if level > 0 {
                g = 2. * (g + d)
            } else {
                residual = self.it.iter().map(|v| v.abs()).sum::<f64>() / self.it.len() as f64;
            }
        }

        let point1 = point0 + g + d;
        if !contains(&frame1.image, point1) {
            return None;
        }
        Some((point1, residual))
    }
}

impl PointTracker for OpticalFlow {
    fn track(&mut self, frame0: &Frame, frame1: &Frame, points0: &[Vector2d]) -> Result<TrackResult> {
        let levels = self
            .lk_levels
            .min(frame0.level_count() - 1)
            .min(frame1.level_count() - 1);

        let mut result = TrackResult::with_capacity(points0.len());
        for point0 in points0 {
            match self.process_feature(frame0, frame1, *point0, levels) {
                Some((point1, residual)) => result.push(point1, true, residual),
                None => result.push(*point0, false, f64::INFINITY),
            }
        }
        Ok(result)
    }
}

fn flow_vector(gradient: &Matrix2d, ix: &Matrixd, iy: &Matrixd, it: &Matrixd) -> Option<Vector2d> {
    let mut b = Vector2d::zeros();

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            b[0] += it[(y, x)] * ix[(y, x)];
            b[1] += it[(y, x)] * iy[(y, x)];
        }
    }

    gradient.try_inverse().map(|inv_g| inv_g * b)
}

/// Template minus the next level sampled over the template window around
/// `center`. Fails when the center left the level.
fn image_difference(
    range: Range,
    i0: &Matrixd,
    it: &mut Matrixd,
    level: &Image,
    center: Vector2d,
) -> Option<()> {
    if !contains(level, center) {
        return None;
    }
    fill_grid(level, range, center, it);
    *it *= -1.;
    *it += i0.view((1, 1), (it.nrows(), it.ncols()));
    Some(())
}

fn contains(level: &Image, point: Vector2d) -> bool {
    point.x >= 0.
        && point.y >= 0.
        && point.x <= (level.width - 1) as f64
        && point.y <= (level.height - 1) as f64
}

fn spatial_gradient(ix: &Matrixd, iy: &Matrixd) -> Matrix2d {
    debug_assert_eq!(ix.shape(), iy.shape());

    let mut x2 = 0.;
    let mut y2 = 0.;
    let mut xy = 0.;

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            x2 += ix[(y, x)] * ix[(y, x)];
            y2 += iy[(y, x)] * iy[(y, x)];
            xy += ix[(y, x)] * iy[(y, x)];
        }
    }

    Matrix2d::new(x2, xy, xy, y2)
}

/// ref https://theailearner.com/tag/scharr-operator/
fn scharr(
    level: &Image,
    center: Vector2d,
    range: Range,
    out_x: &mut Matrixd,
    out_y: &mut Matrixd,
    grid: &mut Matrixd,
) {
    let grange = [
        [range[0][0] - 1, range[0][1] + 1],
        [range[1][0] - 1, range[1][1] + 1],
    ];
    fill_grid(level, grange, center, grid);

    *out_x = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    *out_y = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    for y in 1..(grid.nrows() - 1) {
        for x in 1..(grid.ncols() - 1) {
            out_x[(y - 1, x - 1)] =
                (10. * grid[(y, x + 1)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y - 1, x + 1)]
                    - 10. * grid[(y, x - 1)]
                    - 3. * grid[(y + 1, x - 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
            out_y[(y - 1, x - 1)] =
                (10. * grid[(y + 1, x)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y + 1, x - 1)]
                    - 10. * grid[(y - 1, x)]
                    - 3. * grid[(y - 1, x + 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
        }
    }
}

fn fill_grid(level: &Image, range: Range, center: Vector2d, grid: &mut Matrixd) {
    *grid = na::DMatrix::zeros(
        (range[1][1] - range[1][0] + 1) as usize,
        (range[0][1] - range[0][0] + 1) as usize,
    );

    for (y_ind, y) in (range[1][0]..=range[1][1]).enumerate() {
        for (x_ind, x) in (range[0][0]..=range[0][1]).enumerate() {
            grid[(y_ind, x_ind)] = bilinear(level, center + Vector2d::new(x as f64, y as f64));
        }
    }
}

/// Returns closed range of integer steps that can be taken without going outside
/// the image borders. Returns None if the center point is outside the level
/// boundaries.
fn integration_range(level: &Image, center: Vector2d, r: usize, padding: i16) -> Option<Range> {
    let r = r as i16;
    let mut range = [[0, 0], [0, 0]];
    for i in 0..2 {
        let s = if i == 0 { level.width } else { level.height };
        if !(center[i] >= 0. && center[i] <= (s - 1) as f64) {
            return None;
        }
        let n = center[i] as i16;
        let fract = if center[i].fract() > 0. { 1 } else { 0 };
        range[i] = [
            i16::max(-r, -n + padding),
            i16::min(r, s as i16 - n - padding - 1 - fract),
        ];
        if range[i][0] > range[i][1] {
            return None;
        }
    }
    Some(range)
}
