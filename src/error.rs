use thiserror::Error;

use crate::my_types::ImageShape;

/// Contract violations of the trajectory engine. Any of these aborts the
/// processing of the current video.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("tracker returned {points} points, {status} status flags and {errors} errors for {expected} tracked points")]
    MisalignedTracking {
        expected: usize,
        points: usize,
        status: usize,
        errors: usize,
    },
    #[error("trajectory has {actual} points, descriptors need exactly {expected}")]
    WrongTrajectoryAge { expected: usize, actual: usize },
    #[error("trajectory did not move, its direction is undefined")]
    ZeroArcLength,
    #[error("frame is empty")]
    EmptyFrame,
    #[error("frame shape {actual:?} differs from the previous frame shape {expected:?}")]
    FrameSizeMismatch {
        expected: ImageShape,
        actual: ImageShape,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
