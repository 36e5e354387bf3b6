use anyhow::{bail, Result};

use crate::image::Image;

/// Downscaled copies of an image, each level half the size of its parent.
/// `levels[0]` is the first downscaled level; the full resolution image is
/// kept by the owner.
#[derive(Clone, Debug)]
pub struct Pyramid {
    pub levels: Vec<Image>,
}

impl Pyramid {
    pub fn empty() -> Self {
        Self { levels: vec![] }
    }

    /// Recompute the levels for `frame`, reusing the level buffers.
    pub fn compute(&mut self, frame: &Image, level_count: usize) -> Result<()> {
        self.levels.truncate(level_count);
        while self.levels.len() < level_count {
            self.levels.push(Image::empty())
        }
        if level_count > 0 {
            downscale(frame, &mut self.levels[0])?;
            for i in 1..level_count {
                let (parents, rest) = self.levels.split_at_mut(i);
                downscale(&parents[i - 1], &mut rest[0])?;
            }
        }
        Ok(())
    }
}

/// Gaussian 3x3 downscale of the parent image into child. Odd sizes round up,
/// reads past the borders are clamped. The weighted sum is rounded once.
fn downscale(parent: &Image, child: &mut Image) -> Result<()> {
    if parent.width < 2 || parent.height < 2 {
        bail!(
            "cannot downscale image with shape {} x {}",
            parent.width,
            parent.height
        );
    }

    let w_half = (parent.width + 1) / 2;
    let h_half = (parent.height + 1) / 2;
    child.data.clear();
    child.width = w_half;
    child.height = h_half;

    let v = |x: i32, y: i32| -> u16 { parent.value_clamped(x, y) as u16 };

    for y in 0..h_half as i32 {
        let y2 = 2 * y;
        for x in 0..w_half as i32 {
            let x2 = 2 * x;
            let value = (4 * v(x2, y2)
                + 2 * (v(x2 + 1, y2) + v(x2 - 1, y2) + v(x2, y2 + 1) + v(x2, y2 - 1))
                + (v(x2 + 1, y2 + 1) + v(x2 - 1, y2 - 1) + v(x2 - 1, y2 + 1) + v(x2 + 1, y2 - 1))
                + 8)
                / 16;
            child.data.push(value as u8);
        }
    }
    Ok(())
}
