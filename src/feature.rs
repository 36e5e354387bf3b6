use crate::my_types::*;

/// Positions of one tracked point, one per frame it survived.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    pub points: Vec<Vector2d>,
}

impl Trajectory {
    pub fn new(start: Vector2d) -> Self {
        Trajectory {
            points: vec![start],
        }
    }

    pub fn age(&self) -> usize {
        self.points.len()
    }

    pub fn last(&self) -> Option<&Vector2d> {
        self.points.last()
    }

    pub fn push(&mut self, point: Vector2d) {
        self.points.push(point);
    }

    /// Sum of the Euclidean step lengths.
    pub fn arc_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|step| (step[1] - step[0]).norm())
            .sum()
    }
}

impl From<Vec<Vector2d>> for Trajectory {
    fn from(points: Vec<Vector2d>) -> Self {
        Trajectory { points }
    }
}

/// Descriptor of a matured trajectory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector {
    /// x of (last - first) / arc length
    pub direction_x: f64,
    /// y of (last - first) / arc length
    pub direction_y: f64,
    /// arc length / number of points
    pub mean_displacement: f64,
    /// mean summed point distance to the finalized trajectories, -1 if there
    /// were none
    pub mean_distance: f64,
}

impl FeatureVector {
    pub const LEN: usize = 4;

    /// Classifier input row.
    pub fn as_array(&self) -> [f32; Self::LEN] {
        [
            self.direction_x as f32,
            self.direction_y as f32,
            self.mean_displacement as f32,
            self.mean_distance as f32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_length() {
        let mut trajectory = Trajectory::new(Vector2d::new(0., 0.));
        assert_eq!(trajectory.arc_length(), 0.);
        trajectory.push(Vector2d::new(3., 4.));
        trajectory.push(Vector2d::new(3., 6.));
        assert_eq!(trajectory.age(), 3);
        assert!((trajectory.arc_length() - 7.).abs() < 1e-12);
        assert_eq!(trajectory.last(), Some(&Vector2d::new(3., 6.)));
    }
}
