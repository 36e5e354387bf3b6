use log::debug;

use crate::config::Config;
use crate::descriptor::FeatureExtractor;
use crate::detector::{CandidateDetector, Detector};
use crate::error::TrackerError;
use crate::feature::{FeatureVector, Trajectory};
use crate::frame::Frame;
use crate::image::Image;
use crate::optical_flow::{OpticalFlow, PointTracker};
use crate::store::TrajectoryStore;

/// Frame-by-frame trajectory extraction for one video. The accumulated
/// feature vectors and the finalized trajectories live as long as the
/// tracker; use a fresh instance per video.
pub struct Tracker {
    config: Config,
    point_tracker: Box<dyn PointTracker>,
    detector: Box<dyn CandidateDetector>,
    store: TrajectoryStore,
    extractor: FeatureExtractor,
    features: Vec<FeatureVector>,
    previous_frame: Option<Frame>,
    unused_frame: Option<Frame>,
    // Incremented just before processing a new frame. 0 before the first frame.
    frame_number: usize,
}

impl Tracker {
    /// Lucas-Kanade tracking with Shi-Tomasi candidates.
    pub fn new(config: Config) -> Result<Self, TrackerError> {
        config.validate()?;
        let point_tracker = Box::new(OpticalFlow::new(&config));
        let detector = Box::new(Detector::new(&config));
        Self::with_adapters(config, point_tracker, detector)
    }

    /// Fails on a configuration that `Config::validate` rejects.
    pub fn with_adapters(
        config: Config,
        point_tracker: Box<dyn PointTracker>,
        detector: Box<dyn CandidateDetector>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Tracker {
            store: TrajectoryStore::new(&config),
            extractor: FeatureExtractor::new(config.max_age, config.comparison_window),
            config,
            point_tracker,
            detector,
            features: vec![],
            previous_frame: None,
            unused_frame: None,
            frame_number: 0,
        })
    }

    pub fn process(&mut self, image: &Image) -> Result<(), TrackerError> {
        if image.is_empty() {
            return Err(TrackerError::EmptyFrame);
        }
        if let Some(previous) = &self.previous_frame {
            if previous.image.shape() != image.shape() {
                return Err(TrackerError::FrameSizeMismatch {
                    expected: previous.image.shape(),
                    actual: image.shape(),
                });
            }
        }

        self.frame_number += 1;
        let frame = Frame::new(image, self.config.lk_levels, self.unused_frame.take())?;

        // The first frame only seeds trajectories.
        if let Some(previous) = &self.previous_frame {
            let tracked = self
                .point_tracker
                .track(previous, &frame, &self.store.points())?;
            let finalized = self
                .store
                .update(&tracked, &mut self.extractor, &mut self.features)?;
            if finalized > 0 {
                debug!(
                    "frame {}: finalized {} trajectories, {} features so far",
                    self.frame_number,
                    finalized,
                    self.features.len()
                );
            }
        }

        if self.store.needs_more_points() {
            let candidates = self.detector.detect(
                &frame,
                self.config.max_candidates,
                self.config.quality_level,
                self.config.min_distance,
            );
            debug!(
                "frame {}: {} active, adding {} candidates",
                self.frame_number,
                self.store.len(),
                candidates.len()
            );
            self.store.seed(&candidates);
        }

        self.unused_frame = self.previous_frame.replace(frame);
        Ok(())
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn into_features(self) -> Vec<FeatureVector> {
        self.features
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        self.store.trajectories()
    }

    pub fn finalized_count(&self) -> usize {
        self.extractor.finalized_count()
    }

    pub fn frame_number(&self) -> usize {
        self.frame_number
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::Result;

    use super::*;
    use crate::my_types::*;
    use crate::optical_flow::TrackResult;
    use crate::test_utils::*;

    /// Moves every point by a fixed step.
    struct ConstantFlow {
        step: Vector2d,
        calls: usize,
    }

    impl PointTracker for ConstantFlow {
        fn track(&mut self, _: &Frame, _: &Frame, points0: &[Vector2d]) -> Result<TrackResult> {
            self.calls += 1;
            let mut result = TrackResult::with_capacity(points0.len());
            for point in points0 {
                result.push(point + self.step, true, 0.);
            }
            Ok(result)
        }
    }

    /// Loses the last point without reporting it.
    struct TruncatingFlow;

    impl PointTracker for TruncatingFlow {
        fn track(&mut self, _: &Frame, _: &Frame, points0: &[Vector2d]) -> Result<TrackResult> {
            let mut result = TrackResult::default();
            for point in points0.iter().skip(1) {
                result.push(*point, true, 0.);
            }
            Ok(result)
        }
    }

    /// Hands out queued candidate batches, then nothing.
    struct QueuedDetector {
        batches: VecDeque<Vec<Vector2d>>,
    }

    impl CandidateDetector for QueuedDetector {
        fn detect(&mut self, _: &Frame, max_count: usize, _: f64, _: f64) -> Vec<Vector2d> {
            let mut batch = self.batches.pop_front().unwrap_or_default();
            batch.truncate(max_count);
            batch
        }
    }

    fn points(n: usize, y: f64) -> Vec<Vector2d> {
        (0..n).map(|i| Vector2d::new(10. + 5. * i as f64, y)).collect()
    }

    fn fake_tracker(step: Vector2d, batches: Vec<Vec<Vector2d>>) -> Tracker {
        Tracker::with_adapters(
            Config::default(),
            Box::new(ConstantFlow { step, calls: 0 }),
            Box::new(QueuedDetector {
                batches: batches.into(),
            }),
        )
        .unwrap()
    }

    fn blank() -> Image {
        Image::filled(64, 48, 0)
    }

    #[test]
    fn test_first_frame_only_seeds() {
        let mut tracker = fake_tracker(Vector2d::new(3., 4.), vec![points(3, 10.)]);
        tracker.process(&blank()).unwrap();
        assert_eq!(tracker.frame_number(), 1);
        assert_eq!(tracker.trajectories().len(), 3);
        assert!(tracker.trajectories().iter().all(|t| t.age() == 1));
        assert!(tracker.features().is_empty());
    }

    #[test]
    fn test_replenishes_below_lower_bound() {
        let mut tracker = fake_tracker(Vector2d::new(3., 4.), vec![points(3, 10.), points(10, 30.)]);
        tracker.process(&blank()).unwrap();
        tracker.process(&blank()).unwrap();

        let trajectories = tracker.trajectories();
        assert_eq!(trajectories.len(), 13);
        assert!(trajectories[..3].iter().all(|t| t.age() == 2));
        assert!(trajectories[3..].iter().all(|t| t.age() == 1));
    }

    #[test]
    fn test_no_replenishment_above_lower_bound() {
        let mut tracker = fake_tracker(Vector2d::new(3., 4.), vec![points(6, 10.), points(10, 30.)]);
        tracker.process(&blank()).unwrap();
        tracker.process(&blank()).unwrap();
        assert_eq!(tracker.trajectories().len(), 6);
    }

    #[test]
    fn test_uniform_motion_features() {
        let mut tracker = fake_tracker(Vector2d::new(3., 4.), vec![points(2, 10.)]);
        for _ in 0..10 {
            tracker.process(&blank()).unwrap();
        }
        assert!(tracker.features().is_empty());
        assert!(tracker.trajectories().iter().all(|t| t.age() == 10));

        tracker.process(&blank()).unwrap();
        assert!(tracker.trajectories().is_empty());
        assert_eq!(tracker.finalized_count(), 2);

        let features = tracker.into_features();
        assert_eq!(features.len(), 2);
        for feature in &features {
            // 9 steps of (3, 4): displacement (27, 36) over an arc length of 45
            assert!((feature.direction_x - 0.6).abs() < 1e-9);
            assert!((feature.direction_y - 0.8).abs() < 1e-9);
            assert!((feature.mean_displacement - 4.5).abs() < 1e-9);
        }
        assert_eq!(features[0].mean_distance, -1.);
        // the two trajectories are 5 pixels apart at every point
        assert!((features[1].mean_distance - 50.).abs() < 1e-9);
    }

    #[test]
    fn test_static_video_produces_nothing() {
        let batches = (0..30).map(|_| points(8, 20.)).collect();
        let mut tracker = fake_tracker(Vector2d::zeros(), batches);
        for _ in 0..30 {
            tracker.process(&blank()).unwrap();
            // everything from the previous frame was dropped, only fresh seeds remain
            assert!(tracker.trajectories().iter().all(|t| t.age() == 1));
        }
        assert!(tracker.features().is_empty());
        assert_eq!(tracker.finalized_count(), 0);
    }

    #[test]
    fn test_static_video_with_optical_flow() {
        let image = textured_image(96, 80, 11);
        let mut tracker = Tracker::new(Config::default()).unwrap();
        for _ in 0..15 {
            tracker.process(&image).unwrap();
            assert!(tracker.trajectories().iter().all(|t| t.age() == 1));
        }
        assert!(!tracker.trajectories().is_empty());
        assert!(tracker.features().is_empty());
    }

    #[test]
    fn test_translating_video_with_optical_flow() {
        let base = textured_image(200, 120, 5);
        let mut tracker = Tracker::new(Config::default()).unwrap();
        for k in 0..12 {
            tracker.process(&shifted_image(&base, 3 * k, 0)).unwrap();
        }

        let features = tracker.features();
        assert!(!features.is_empty());
        assert_eq!(features[0].mean_distance, -1.);
        let n = features.len() as f64;
        let direction_x = features.iter().map(|f| f.direction_x).sum::<f64>() / n;
        let displacement = features.iter().map(|f| f.mean_displacement).sum::<f64>() / n;
        assert!(direction_x > 0.9, "mean direction x {direction_x}");
        // 9 steps of 3 pixels over 10 points
        assert!((displacement - 2.7).abs() < 0.3, "mean displacement {displacement}");
    }

    #[test]
    fn test_misaligned_tracker_is_fatal() {
        let mut tracker = Tracker::with_adapters(
            Config::default(),
            Box::new(TruncatingFlow),
            Box::new(QueuedDetector {
                batches: vec![points(3, 10.)].into(),
            }),
        )
        .unwrap();
        tracker.process(&blank()).unwrap();
        let result = tracker.process(&blank());
        assert!(matches!(
            result,
            Err(TrackerError::MisalignedTracking { expected: 3, points: 2, .. })
        ));
    }

    #[test]
    fn test_malformed_frames() {
        let mut tracker = fake_tracker(Vector2d::new(3., 4.), vec![]);
        assert!(matches!(tracker.process(&Image::empty()), Err(TrackerError::EmptyFrame)));

        tracker.process(&blank()).unwrap();
        let result = tracker.process(&Image::filled(32, 32, 0));
        assert!(matches!(
            result,
            Err(TrackerError::FrameSizeMismatch {
                expected: (64, 48),
                actual: (32, 32)
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        // single-point trajectories never move
        let mut config = Config::default();
        config.max_age = 1;
        assert!(matches!(Tracker::new(config.clone()), Err(TrackerError::Other(_))));
        let with_fakes = Tracker::with_adapters(
            config,
            Box::new(ConstantFlow {
                step: Vector2d::new(3., 4.),
                calls: 0,
            }),
            Box::new(QueuedDetector {
                batches: VecDeque::new(),
            }),
        );
        assert!(with_fakes.is_err());

        let mut config = Config::default();
        config.lk_win_size = 0;
        let err = Tracker::new(config).err().unwrap();
        assert!(err.to_string().contains("lk_win_size"), "{err}");
    }
}
