use log::trace;

use crate::config::Config;
use crate::descriptor::FeatureExtractor;
use crate::error::TrackerError;
use crate::feature::{FeatureVector, Trajectory};
use crate::math::manhattan;
use crate::my_types::*;
use crate::optical_flow::TrackResult;

/// The active population. The last point of each trajectory is the position
/// handed to the point tracker, so positions and trajectories cannot drift
/// out of alignment.
#[derive(Debug)]
pub struct TrajectoryStore {
    max_age: usize,
    lower_bound: usize,
    movement_sensitivity: f64,
    trajectories: Vec<Trajectory>,
}

impl TrajectoryStore {
    pub fn new(config: &Config) -> Self {
        TrajectoryStore {
            max_age: config.max_age,
            lower_bound: config.lower_bound,
            movement_sensitivity: config.movement_sensitivity,
            trajectories: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Current position of every active trajectory, in population order.
    pub fn points(&self) -> Vec<Vector2d> {
        self.trajectories
            .iter()
            .filter_map(|trajectory| trajectory.last().copied())
            .collect()
    }

    pub fn needs_more_points(&self) -> bool {
        self.trajectories.len() <= self.lower_bound
    }

    /// Start a single-point trajectory per candidate.
    pub fn seed(&mut self, candidates: &[Vector2d]) {
        self.trajectories
            .extend(candidates.iter().map(|&candidate| Trajectory::new(candidate)));
    }

    /// Apply one tracking step. Trajectories at `max_age` are finalized into
    /// `features`; survivors get their tracked position appended and are
    /// compacted to the front, keeping their relative order. Returns the
    /// number of finalized trajectories.
    pub fn update(
        &mut self,
        tracked: &TrackResult,
        extractor: &mut FeatureExtractor,
        features: &mut Vec<FeatureVector>,
    ) -> Result<usize, TrackerError> {
        let n = self.trajectories.len();
        if tracked.points.len() != n || tracked.status.len() != n || tracked.errors.len() != n {
            return Err(TrackerError::MisalignedTracking {
                expected: n,
                points: tracked.points.len(),
                status: tracked.status.len(),
                errors: tracked.errors.len(),
            });
        }

        let mut finalized = 0;
        let mut k = 0;
        for i in 0..n {
            if self.trajectories[i].age() == self.max_age {
                features.push(extractor.finalize_trajectory(&self.trajectories[i])?);
                finalized += 1;
            }

            if self.keep(i, tracked) {
                self.trajectories.swap(k, i);
                self.trajectories[k].push(tracked.points[i]);
                k += 1;
            } else {
                trace!("dropping trajectory {i} (status {}, age {})", tracked.status[i], self.trajectories[i].age());
            }
        }
        self.trajectories.truncate(k);

        Ok(finalized)
    }

    /// Tracked successfully, moved more than the sensitivity and still young
    /// enough to grow.
    fn keep(&self, i: usize, tracked: &TrackResult) -> bool {
        let trajectory = &self.trajectories[i];
        tracked.status[i]
            && trajectory
                .last()
                .map_or(false, |previous| manhattan(previous, &tracked.points[i]) > self.movement_sensitivity)
            && trajectory.age() < self.max_age
    }
}
