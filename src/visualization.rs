use cv2::prelude::*;
use opencv as cv2;

use anyhow::Result;
use ndarray as nd;

use crate::feature::Trajectory;
use crate::my_types::Vector2d;

trait AsArray {
    fn try_as_array(&self) -> Result<nd::Array3<u8>>;
}

impl AsArray for cv2::core::Mat {
    fn try_as_array(&self) -> Result<nd::Array3<u8>> {
        let bytes = self.data_bytes()?;
        let size = self.size()?;
        let a = nd::ArrayView3::from_shape((size.height as usize, size.width as usize, 3), bytes)?;
        Ok(a.to_owned())
    }
}

fn to_cv_point(point: &Vector2d) -> cv2::core::Point {
    cv2::core::Point {
        x: point.x.round() as i32,
        y: point.y.round() as i32,
    }
}

/// Draw the path of every trajectory with more than one point onto a BGR
/// frame: green polyline, red dot at the current position.
pub fn draw_trajectories(output: &mut cv2::core::Mat, trajectories: &[Trajectory]) -> Result<()> {
    let green = cv2::core::Scalar::new(0.0, 255.0, 0.0, 0.0);
    let red = cv2::core::Scalar::new(0.0, 0.0, 255.0, 0.0);

    for trajectory in trajectories.iter().filter(|t| t.age() > 1) {
        for step in trajectory.points.windows(2) {
            cv2::imgproc::line(
                output,
                to_cv_point(&step[0]),
                to_cv_point(&step[1]),
                green,
                1,
                cv2::imgproc::LINE_AA,
                0,
            )?;
        }
        if let Some(head) = trajectory.last() {
            cv2::imgproc::circle(
                output,
                to_cv_point(head),
                2,
                red,
                cv2::imgproc::FILLED,
                cv2::imgproc::LINE_AA,
                0,
            )?;
        }
    }
    Ok(())
}

/// RGB copy of a BGR frame for the rerun viewer.
pub fn bgr_to_rgb_array(frame: &cv2::core::Mat) -> Result<nd::Array3<u8>> {
    let mut rgb = cv2::core::Mat::default();
    cv2::imgproc::cvt_color(frame, &mut rgb, cv2::imgproc::COLOR_BGR2RGB, 0)?;
    rgb.try_as_array()
}
