use anyhow::Result;

use crate::image::Image;
use crate::pyramid::Pyramid;

/// A grayscale frame together with its image pyramid.
#[derive(Clone, Debug)]
pub struct Frame {
    /// original image
    pub image: Image,
    /// downsized images
    pub pyramid: Pyramid,
}

impl Frame {
    pub fn new(image: &Image, lk_levels: usize, unused_frame: Option<Frame>) -> Result<Frame> {
        let mut frame = if let Some(mut unused_frame) = unused_frame {
            // Move data buffer from old unused frame to the new frame to avoid allocation
            unused_frame.image.clear();
            unused_frame
        } else {
            Frame {
                image: Image::empty(),
                pyramid: Pyramid::empty(),
            }
        };

        frame.image.data.extend(image.data.iter());
        frame.image.width = image.width;
        frame.image.height = image.height;
        frame.pyramid.compute(&frame.image, lk_levels)?;

        Ok(frame)
    }

    /// Level 0 is the original image.
    pub fn get_image_at_level(&self, level: usize) -> &Image {
        if level == 0 {
            &self.image
        } else {
            &self.pyramid.levels[level - 1]
        }
    }

    pub fn level_count(&self) -> usize {
        self.pyramid.levels.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_unused_frame() {
        let first = Image::filled(64, 48, 10);
        let second = Image::filled(64, 48, 90);
        let frame = Frame::new(&first, 2, None).unwrap();
        assert_eq!(frame.level_count(), 3);

        let frame = Frame::new(&second, 2, Some(frame)).unwrap();
        assert_eq!(frame.image, second);
        assert_eq!(frame.get_image_at_level(2).shape(), (16, 12));
        assert!(frame.get_image_at_level(1).data.iter().all(|&v| v == 90));
        assert!(frame.get_image_at_level(2).data.iter().all(|&v| v == 90));
    }
}
