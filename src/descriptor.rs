use std::collections::VecDeque;

use crate::error::TrackerError;
use crate::feature::{FeatureVector, Trajectory};

/// Turns matured trajectories into descriptors. Keeps every finalized
/// trajectory of the run so that later descriptors can be compared against
/// them.
#[derive(Debug)]
pub struct FeatureExtractor {
    max_age: usize,
    /// Bound on the comparison set, unbounded when `None`.
    comparison_window: Option<usize>,
    finalized: VecDeque<Trajectory>,
}

impl FeatureExtractor {
    pub fn new(max_age: usize, comparison_window: Option<usize>) -> Self {
        FeatureExtractor {
            max_age,
            comparison_window,
            finalized: VecDeque::new(),
        }
    }

    pub fn finalized(&self) -> impl Iterator<Item = &Trajectory> {
        self.finalized.iter()
    }

    pub fn finalized_count(&self) -> usize {
        self.finalized.len()
    }

    /// Descriptor of `trajectory` against the current finalized set.
    pub fn extract(&self, trajectory: &Trajectory) -> Result<FeatureVector, TrackerError> {
        if trajectory.age() != self.max_age {
            return Err(TrackerError::WrongTrajectoryAge {
                expected: self.max_age,
                actual: trajectory.age(),
            });
        }
        let arc_length = trajectory.arc_length();
        if arc_length == 0. {
            return Err(TrackerError::ZeroArcLength);
        }

        let points = &trajectory.points;
        let displacement = points[points.len() - 1] - points[0];
        Ok(FeatureVector {
            direction_x: displacement.x / arc_length,
            direction_y: displacement.y / arc_length,
            mean_displacement: arc_length / points.len() as f64,
            mean_distance: self.mean_distance(trajectory),
        })
    }

    /// Add a matured trajectory to the comparison set.
    pub fn finalize(&mut self, trajectory: Trajectory) {
        debug_assert_eq!(trajectory.age(), self.max_age);
        self.finalized.push_back(trajectory);
        if let Some(window) = self.comparison_window {
            while self.finalized.len() > window {
                self.finalized.pop_front();
            }
        }
    }

    /// `extract` then `finalize`.
    pub fn finalize_trajectory(&mut self, trajectory: &Trajectory) -> Result<FeatureVector, TrackerError> {
        let feature = self.extract(trajectory)?;
        self.finalize(trajectory.clone());
        Ok(feature)
    }

    /// Average over the finalized trajectories of the summed point-wise
    /// distances, -1 when there is nothing to compare against.
    fn mean_distance(&self, trajectory: &Trajectory) -> f64 {
        if self.finalized.is_empty() {
            return -1.;
        }
        let total: f64 = self
            .finalized
            .iter()
            .map(|other| {
                other
                    .points
                    .iter()
                    .zip(&trajectory.points)
                    .map(|(a, b)| (a - b).norm())
                    .sum::<f64>()
            })
            .sum();
        total / self.finalized.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::my_types::*;

    fn uniform(start: Vector2d, step: Vector2d, len: usize) -> Trajectory {
        (0..len)
            .map(|i| start + step * i as f64)
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_uniform_motion() {
        let extractor = FeatureExtractor::new(10, None);
        let trajectory = uniform(Vector2d::new(5., 5.), Vector2d::new(3., 4.), 10);
        let feature = extractor.extract(&trajectory).unwrap();
        assert!((feature.direction_x - 27. / 45.).abs() < 1e-12);
        assert!((feature.direction_y - 36. / 45.).abs() < 1e-12);
        assert!((feature.mean_displacement - 4.5).abs() < 1e-12);
        assert_eq!(feature.mean_distance, -1.);
    }

    #[test]
    fn test_direction_is_unit_for_straight_motion() {
        let extractor = FeatureExtractor::new(10, None);
        let trajectory = uniform(Vector2d::new(0., 0.), Vector2d::new(3., 4.), 10);
        let feature = extractor.extract(&trajectory).unwrap();
        let norm = (feature.direction_x.powi(2) + feature.direction_y.powi(2)).sqrt();
        assert!((norm - 1.).abs() < 1e-12);
    }

    #[test]
    fn test_mean_distance_against_finalized() {
        let mut extractor = FeatureExtractor::new(3, None);
        let step = Vector2d::new(2., 0.);
        let first = uniform(Vector2d::new(0., 0.), step, 3);
        let second = uniform(Vector2d::new(0., 1.), step, 3);
        let third = uniform(Vector2d::new(0., 4.), step, 3);

        assert_eq!(extractor.finalize_trajectory(&first).unwrap().mean_distance, -1.);
        // 3 points, each 1 away from `first`
        assert!((extractor.finalize_trajectory(&second).unwrap().mean_distance - 3.).abs() < 1e-12);
        // (3 * 4 + 3 * 3) / 2
        assert!((extractor.finalize_trajectory(&third).unwrap().mean_distance - 10.5).abs() < 1e-12);
        assert_eq!(extractor.finalized_count(), 3);
    }

    #[test]
    fn test_comparison_window() {
        let mut extractor = FeatureExtractor::new(3, Some(1));
        let step = Vector2d::new(2., 0.);
        extractor.finalize(uniform(Vector2d::new(0., 0.), step, 3));
        extractor.finalize(uniform(Vector2d::new(0., 1.), step, 3));
        assert_eq!(extractor.finalized_count(), 1);

        let feature = extractor
            .extract(&uniform(Vector2d::new(0., 4.), step, 3))
            .unwrap();
        assert!((feature.mean_distance - 9.).abs() < 1e-12);
    }

    #[test]
    fn test_preconditions() {
        let extractor = FeatureExtractor::new(10, None);
        let short = uniform(Vector2d::new(0., 0.), Vector2d::new(1., 1.), 9);
        assert!(matches!(
            extractor.extract(&short),
            Err(TrackerError::WrongTrajectoryAge { expected: 10, actual: 9 })
        ));

        let still = uniform(Vector2d::new(4., 4.), Vector2d::zeros(), 10);
        assert!(matches!(extractor.extract(&still), Err(TrackerError::ZeroArcLength)));
    }
}
