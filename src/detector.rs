use std::cmp::Ordering;

use log::debug;

use crate::config::Config;
use crate::frame::Frame;
use crate::image::Image;
use crate::math::min_eigenvalue;
use crate::my_types::*;

/// Proposes new points worth tracking.
pub trait CandidateDetector {
    /// At most `max_count` points, none weaker than `quality_level` times the
    /// strongest response and none closer than `min_distance` to a stronger one.
    fn detect(
        &mut self,
        frame: &Frame,
        max_count: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Vec<Vector2d>;
}

/// Shi-Tomasi corner detector ("good features to track").
pub struct Detector {
    block_size: usize,
    gx: Vec<f64>,
    gy: Vec<f64>,
    response: Vec<f64>,
}

#[derive(Clone, Copy, Debug)]
struct Corner {
    x: usize,
    y: usize,
    score: f64,
}

impl Detector {
    pub fn new(config: &Config) -> Self {
        Detector {
            block_size: config.block_size,
            gx: vec![],
            gy: vec![],
            response: vec![],
        }
    }

    /// Sobel gradients followed by the minimum eigenvalue of the structure
    /// tensor summed over a `block_size` window.
    fn compute_response(&mut self, image: &Image) {
        let (w, h) = (image.width, image.height);
        self.gx.clear();
        self.gy.clear();
        self.response.clear();

        let v = |x: i32, y: i32| image.value_clamped(x, y) as f64;
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                self.gx.push(
                    v(x + 1, y - 1) + 2. * v(x + 1, y) + v(x + 1, y + 1)
                        - v(x - 1, y - 1)
                        - 2. * v(x - 1, y)
                        - v(x - 1, y + 1),
                );
                self.gy.push(
                    v(x - 1, y + 1) + 2. * v(x, y + 1) + v(x + 1, y + 1)
                        - v(x - 1, y - 1)
                        - 2. * v(x, y - 1)
                        - v(x + 1, y - 1),
                );
            }
        }

        let r = (self.block_size / 2) as i32;
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let mut tensor = Matrix2d::zeros();
                for by in (y - r).max(0)..=(y + r).min(h as i32 - 1) {
                    for bx in (x - r).max(0)..=(x + r).min(w as i32 - 1) {
                        let i = by as usize * w + bx as usize;
                        let (gx, gy) = (self.gx[i], self.gy[i]);
                        tensor[(0, 0)] += gx * gx;
                        tensor[(0, 1)] += gx * gy;
                        tensor[(1, 1)] += gy * gy;
                    }
                }
                tensor[(1, 0)] = tensor[(0, 1)];
                self.response.push(min_eigenvalue(&tensor).max(0.));
            }
        }
    }

    /// Local maxima of the response above the quality threshold, strongest first.
    fn corners(&self, width: usize, height: usize, quality_level: f64) -> Vec<Corner> {
        let max_response = self.response.iter().cloned().fold(0., f64::max);
        if max_response <= 0. {
            return vec![];
        }
        let threshold = max_response * quality_level;

        let mut corners = vec![];
        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let score = self.response[y * width + x];
                if score <= threshold {
                    continue;
                }
                let is_peak = (y - 1..=y + 1)
                    .all(|ny| (x - 1..=x + 1).all(|nx| self.response[ny * width + nx] <= score));
                if is_peak {
                    corners.push(Corner { x, y, score });
                }
            }
        }
        corners.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        corners
    }
}

impl CandidateDetector for Detector {
    fn detect(
        &mut self,
        frame: &Frame,
        max_count: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Vec<Vector2d> {
        let image = &frame.image;
        if max_count == 0 || image.width < 3 || image.height < 3 {
            return vec![];
        }

        self.compute_response(image);
        let corners = self.corners(image.width, image.height, quality_level);

        let min_distance2 = min_distance * min_distance;
        let mut selected: Vec<Vector2d> = vec![];
        for corner in &corners {
            let point = Vector2d::new(corner.x as f64, corner.y as f64);
            if selected
                .iter()
                .all(|other| (other - point).norm_squared() >= min_distance2)
            {
                selected.push(point);
                if selected.len() == max_count {
                    break;
                }
            }
        }
        debug!(
            "selected {} of {} corners (max: {})",
            selected.len(),
            corners.len(),
            max_count
        );
        selected
    }
}
