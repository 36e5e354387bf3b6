use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::image::Image;

/// Box-blurred uniform noise, deterministic for a given seed.
pub fn textured_image(width: usize, height: usize, seed: u64) -> Image {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let noise = Image {
        data: (0..width * height).map(|_| rng.gen::<u8>()).collect(),
        width,
        height,
    };

    let r = 2;
    let mut blurred = Image::filled(width, height, 0);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let mut sum = 0u32;
            for dy in -r..=r {
                for dx in -r..=r {
                    sum += noise.value_clamped(x + dx, y + dy) as u32;
                }
            }
            blurred.set_value(x as usize, y as usize, (sum / 25) as u8);
        }
    }
    blurred
}

/// Content moved by (dx, dy); uncovered pixels repeat the border.
pub fn shifted_image(image: &Image, dx: i32, dy: i32) -> Image {
    let mut shifted = Image::filled(image.width, image.height, 0);
    for y in 0..image.height as i32 {
        for x in 0..image.width as i32 {
            shifted.set_value(x as usize, y as usize, image.value_clamped(x - dx, y - dy));
        }
    }
    shifted
}
