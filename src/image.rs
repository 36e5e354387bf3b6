use anyhow::{bail, Result};

use crate::my_types::*;

/// Row-major grayscale image storage
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Image {
    /// Create an empty image
    pub fn empty() -> Image {
        Image {
            data: vec![],
            width: 0,
            height: 0,
        }
    }

    /// Create an image filled with a single value
    pub fn filled(width: usize, height: usize, value: u8) -> Image {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap a row-major buffer, checking that it matches the given shape
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Image> {
        if data.len() != width * height {
            bail!(
                "buffer of {} bytes does not match image shape {width} x {height}",
                data.len()
            );
        }
        Ok(Image {
            data,
            width,
            height,
        })
    }

    /// Clear the image storage
    pub fn clear(&mut self) {
        self.data.clear();
        self.width = 0;
        self.height = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn shape(&self) -> ImageShape {
        (self.width, self.height)
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline(always)]
    pub fn value_i32(&self, x: i32, y: i32) -> u8 {
        self.data[y as usize * self.width + x as usize]
    }

    /// Pixel value with coordinates clamped to the image borders
    #[inline(always)]
    pub fn value_clamped(&self, x: i32, y: i32) -> u8 {
        let x = x.clamp(0, self.width as i32 - 1);
        let y = y.clamp(0, self.height as i32 - 1);
        self.value_i32(x, y)
    }

    #[inline(always)]
    pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Copy `patch` so that its top-left corner lands on (x, y). Pixels falling
    /// outside the image are dropped.
    pub fn set_sub_image_i32(&mut self, x: i32, y: i32, patch: &Image) {
        for py in 0..patch.height as i32 {
            for px in 0..patch.width as i32 {
                let (tx, ty) = (x + px, y + py);
                if tx < 0 || ty < 0 || tx >= self.width as i32 || ty >= self.height as i32 {
                    continue;
                }
                self.set_value(tx as usize, ty as usize, patch.value_i32(px, py));
            }
        }
    }
}

/// Bilinear interpolation at a sub-pixel position. Coordinate (0, 0) is the
/// center of the top-left pixel; positions outside the image are clamped.
pub fn bilinear(image: &Image, point: Vector2d) -> f64 {
    let x = point.x.clamp(0., (image.width - 1) as f64);
    let y = point.y.clamp(0., (image.height - 1) as f64);
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let ax = x - x0 as f64;
    let ay = y - y0 as f64;

    let v00 = image.value_clamped(x0, y0) as f64;
    let v10 = image.value_clamped(x0 + 1, y0) as f64;
    let v01 = image.value_clamped(x0, y0 + 1) as f64;
    let v11 = image.value_clamped(x0 + 1, y0 + 1) as f64;

    (1. - ay) * ((1. - ax) * v00 + ax * v10) + ay * ((1. - ax) * v01 + ax * v11)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_checks_shape() {
        assert!(Image::from_raw(3, 2, vec![0; 6]).is_ok());
        assert!(Image::from_raw(3, 2, vec![0; 5]).is_err());
    }

    #[test]
    fn test_bilinear() {
        let image = Image::from_raw(2, 2, vec![0, 100, 100, 200]).unwrap();
        assert_eq!(bilinear(&image, Vector2d::new(0., 0.)), 0.);
        assert_eq!(bilinear(&image, Vector2d::new(1., 1.)), 200.);
        assert_eq!(bilinear(&image, Vector2d::new(0.5, 0.5)), 100.);
        assert_eq!(bilinear(&image, Vector2d::new(0.5, 0.)), 50.);
        // clamped outside the borders
        assert_eq!(bilinear(&image, Vector2d::new(-3., 5.)), 100.);
    }

    #[test]
    fn test_set_sub_image_clips() {
        let mut image = Image::filled(4, 4, 0);
        let patch = Image::filled(3, 3, 9);
        image.set_sub_image_i32(2, -1, &patch);
        assert_eq!(image.value(2, 0), 9);
        assert_eq!(image.value(3, 1), 9);
        assert_eq!(image.value(3, 2), 0);
        assert_eq!(image.value(1, 0), 0);
    }
}
