use crate::pixel_buffer::{luminance, PixelBuffer};

/// Destination rectangle of a composite, already clamped to the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Clamp a requested offset against the background and size the overlap.
    ///
    /// Negative offsets clamp to 0. An offset at or past the background edge
    /// yields an empty region.
    pub fn clamp(background: &PixelBuffer, foreground: &PixelBuffer, x_offset: i64, y_offset: i64) -> Self {
        let (x, width) = clamp_axis(x_offset, background.width(), foreground.width());
        let (y, height) = clamp_axis(y_offset, background.height(), foreground.height());
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the region lies inside the background and within the foreground's size.
    pub fn fits(&self, background: &PixelBuffer, foreground: &PixelBuffer) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(background.width())
            && u64::from(self.y) + u64::from(self.height) <= u64::from(background.height())
            && self.width <= foreground.width()
            && self.height <= foreground.height()
    }
}

fn clamp_axis(offset: i64, background: u32, foreground: u32) -> (u32, u32) {
    let start = offset.clamp(0, i64::from(background)) as u32;
    (start, foreground.min(background - start))
}

/// Opacity of a foreground pixel.
///
/// Luminance is stretched linearly from the foreground's own darkest tone
/// (opaque) up to white (transparent). An all-white foreground has no range
/// to stretch and is fully transparent.
pub fn alpha(rgb: &[u8], min_luminance: u8) -> f32 {
    if min_luminance == u8::MAX {
        return 0.0;
    }
    let lum = f32::from(luminance(rgb[0], rgb[1], rgb[2]));
    let min = f32::from(min_luminance);
    let gray = (lum - min) * 255.0 / (255.0 - min) / 255.0;
    (1.0 - gray).clamp(0.0, 1.0)
}

/// `src * alpha + dst * (1 - alpha)`, truncated toward zero.
fn blend_channel(src: u8, dst: u8, alpha: f32) -> u8 {
    (f32::from(src) * alpha + f32::from(dst) * (1.0 - alpha)) as u8
}

/// Blend `foreground` onto `background` with its top-left corner at the
/// given offset. Only pixels inside the clamped region change.
pub fn composite(background: &mut PixelBuffer, foreground: &PixelBuffer, x_offset: i64, y_offset: i64) -> Region {
    let region = Region::clamp(background, foreground, x_offset, y_offset);

    if region.is_empty() {
        tracing::warn!(
            "Watermark offset ({}, {}) lies outside the {}x{} background, nothing to composite",
            x_offset,
            y_offset,
            background.width(),
            background.height()
        );
        return region;
    }

    tracing::debug!(
        "Compositing {}x{} region at ({}, {})",
        region.width,
        region.height,
        region.x,
        region.y
    );

    debug_assert!(
        region.fits(background, foreground),
        "clamped region {:?} exceeds {}x{} background or {}x{} foreground",
        region,
        background.width(),
        background.height(),
        foreground.width(),
        foreground.height()
    );

    let min_luminance = foreground.min_luminance();

    for y in 0..region.height {
        for x in 0..region.width {
            let (Some(src), Some(dst)) = (
                foreground.pixel(x, y),
                background.pixel_mut(region.x + x, region.y + y),
            ) else {
                tracing::error!("Pixel ({}, {}) of region {:?} is out of bounds", x, y, region);
                continue;
            };

            let a = alpha(src, min_luminance);
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = blend_channel(s, *d, a);
            }
        }
    }

    region
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_buffer::COMPONENTS;

    fn gray_ramp(values: &[u8]) -> PixelBuffer {
        let row: Vec<u8> = values.iter().flat_map(|&v| [v, v, v]).collect();
        PixelBuffer::from_scanlines(values.len() as u32, 1, COMPONENTS, [row.as_slice()]).unwrap()
    }

    #[test]
    fn darkest_tone_is_opaque() {
        assert_eq!(alpha(&[0, 0, 0], 0), 1.0);
        assert_eq!(alpha(&[90, 90, 90], 90), 1.0);
    }

    #[test]
    fn white_is_transparent() {
        assert_eq!(alpha(&[255, 255, 255], 0), 0.0);
        assert_eq!(alpha(&[255, 255, 255], 200), 0.0);
    }

    #[test]
    fn alpha_stretches_from_foreground_minimum() {
        // Halfway between 55 and 255.
        let a = alpha(&[155, 155, 155], 55);
        assert!((a - 0.5).abs() < 1e-6);
    }

    #[test]
    fn all_white_minimum_forces_zero_alpha() {
        assert_eq!(alpha(&[255, 255, 255], 255), 0.0);
    }

    #[test]
    fn alpha_stays_in_unit_range() {
        // A pixel darker than the recorded minimum cannot come from a decode,
        // but the result must still be usable as a blend factor.
        assert_eq!(alpha(&[0, 0, 0], 100), 1.0);
        for v in 0..=255u8 {
            let a = alpha(&[v, v, v], 17);
            assert!((0.0..=1.0).contains(&a));
        }
    }

    #[test]
    fn region_clamps_negative_offsets_to_zero() {
        let bg = PixelBuffer::from_pixel(4, 4, [0, 0, 0]);
        let fg = PixelBuffer::from_pixel(2, 3, [0, 0, 0]);
        let region = Region::clamp(&bg, &fg, -5, -1);
        assert_eq!(
            region,
            Region {
                x: 0,
                y: 0,
                width: 2,
                height: 3
            }
        );
    }

    #[test]
    fn region_is_cropped_at_background_edge() {
        let bg = PixelBuffer::from_pixel(4, 4, [0, 0, 0]);
        let fg = PixelBuffer::from_pixel(3, 3, [0, 0, 0]);
        let region = Region::clamp(&bg, &fg, 3, 2);
        assert_eq!(
            region,
            Region {
                x: 3,
                y: 2,
                width: 1,
                height: 2
            }
        );
    }

    #[test]
    fn clamped_region_always_fits_both_buffers() {
        let offsets = [i64::MIN, -7, -1, 0, 1, 2, 3, 4, 5, 9, i64::MAX];
        for (bw, bh) in [(1, 1), (4, 3), (5, 5)] {
            let bg = PixelBuffer::from_pixel(bw, bh, [0, 0, 0]);
            for (fw, fh) in [(1, 1), (2, 5), (6, 2)] {
                let fg = PixelBuffer::from_pixel(fw, fh, [0, 0, 0]);
                for &x in &offsets {
                    for &y in &offsets {
                        let region = Region::clamp(&bg, &fg, x, y);
                        assert!(region.fits(&bg, &fg), "{region:?} for offset ({x}, {y})");
                        let expected_w = if x >= i64::from(bw) { 0 } else { fw.min(bw - x.max(0) as u32) };
                        assert_eq!(region.width, expected_w, "offset ({x}, {y})");
                    }
                }
            }
        }
    }

    #[test]
    fn every_region_pixel_is_blended() {
        // Foreground partly off the right and bottom edges: the visible 2x1 strip must all change.
        let mut bg = PixelBuffer::from_pixel(4, 3, [200, 200, 200]);
        let fg = PixelBuffer::from_pixel(3, 3, [0, 0, 0]);

        let region = composite(&mut bg, &fg, 2, 2);

        assert_eq!((region.width, region.height), (2, 1));
        assert_eq!(bg.pixel(2, 2), Some(&[0u8, 0, 0][..]));
        assert_eq!(bg.pixel(3, 2), Some(&[0u8, 0, 0][..]));
        assert_eq!(bg.pixel(1, 2), Some(&[200u8, 200, 200][..]));
        assert_eq!(bg.pixel(3, 1), Some(&[200u8, 200, 200][..]));
    }

    #[test]
    fn region_fit_check_catches_oversized_regions() {
        let bg = PixelBuffer::from_pixel(4, 4, [0, 0, 0]);
        let fg = PixelBuffer::from_pixel(2, 2, [0, 0, 0]);
        let past_edge = Region { x: 3, y: 0, width: 2, height: 1 };
        let wider_than_fg = Region { x: 0, y: 0, width: 3, height: 1 };
        assert!(!past_edge.fits(&bg, &fg));
        assert!(!wider_than_fg.fits(&bg, &fg));
    }

    #[test]
    fn offset_past_edge_is_a_no_op() {
        let fg = PixelBuffer::from_pixel(2, 2, [0, 0, 0]);
        for (x, y) in [(4, 0), (0, 4), (10, 10), (i64::MAX, 0), (0, i64::MAX)] {
            let mut bg = PixelBuffer::from_pixel(4, 4, [200, 200, 200]);
            let before = bg.clone();
            let region = composite(&mut bg, &fg, x, y);
            assert!(region.is_empty());
            assert_eq!(bg, before);
        }
    }

    #[test]
    fn black_square_over_gray_background() {
        let mut bg = PixelBuffer::from_pixel(4, 4, [200, 200, 200]);
        let fg = PixelBuffer::from_pixel(2, 2, [0, 0, 0]);
        assert_eq!(fg.min_luminance(), 0);

        composite(&mut bg, &fg, 1, 1);

        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..=2).contains(&x) && (1..=2).contains(&y);
                let expected: &[u8] = if inside { &[0, 0, 0] } else { &[200, 200, 200] };
                assert_eq!(bg.pixel(x, y), Some(expected), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn uniform_darkest_tone_copies_foreground() {
        let mut bg = PixelBuffer::from_pixel(3, 3, [10, 220, 40]);
        let fg = PixelBuffer::from_pixel(2, 2, [123, 123, 123]);
        assert_eq!(fg.min_luminance(), 123);

        composite(&mut bg, &fg, 0, 0);

        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(bg.pixel(x, y), Some(&[123u8, 123, 123][..]));
            }
        }
        assert_eq!(bg.pixel(2, 2), Some(&[10u8, 220, 40][..]));
    }

    #[test]
    fn all_white_foreground_leaves_background_unchanged() {
        let mut bg = PixelBuffer::from_pixel(3, 3, [17, 99, 201]);
        let before = bg.clone();
        let fg = PixelBuffer::from_pixel(3, 3, [255, 255, 255]);
        assert_eq!(fg.min_luminance(), 255);

        let region = composite(&mut bg, &fg, 0, 0);

        assert!(!region.is_empty());
        assert_eq!(bg, before);
    }

    #[test]
    fn blended_channels_truncate_toward_zero() {
        // min 0, pixel 51 -> gray 0.2, alpha 0.8; 51 * 0.8 = 40.8 -> 40
        let fg = gray_ramp(&[0, 51]);
        let mut bg = PixelBuffer::from_pixel(2, 1, [0, 0, 0]);

        composite(&mut bg, &fg, 0, 0);

        assert_eq!(bg.pixel(1, 0), Some(&[40u8, 40, 40][..]));
    }

    #[test]
    fn compositing_twice_is_not_idempotent() {
        // min 0, pixel 102 -> alpha 0.6
        let fg = gray_ramp(&[0, 102]);
        let mut bg = PixelBuffer::from_pixel(2, 1, [250, 250, 250]);

        composite(&mut bg, &fg, 0, 0);
        let once = bg.clone();
        // 102 * 0.6 + 250 * 0.4 = 161.2
        assert_eq!(once.pixel(1, 0), Some(&[161u8, 161, 161][..]));

        composite(&mut bg, &fg, 0, 0);
        // 102 * 0.6 + 161 * 0.4 = 125.6
        assert_ne!(bg, once);
        assert_eq!(bg.pixel(1, 0), Some(&[125u8, 125, 125][..]));
    }

    #[test]
    fn dimensions_and_length_survive_composite() {
        let mut bg = PixelBuffer::from_pixel(5, 3, [1, 2, 3]);
        let fg = gray_ramp(&[0, 60, 120, 180, 240, 255, 30]);

        composite(&mut bg, &fg, 2, 1);

        assert_eq!(bg.dimensions(), (5, 3));
        assert_eq!(bg.as_raw().len(), 5 * 3 * COMPONENTS);
        assert_eq!(bg.min_luminance(), 1);
    }

    #[test]
    fn foreground_is_untouched() {
        let fg = gray_ramp(&[0, 51, 200]);
        let before = fg.clone();
        let mut bg = PixelBuffer::from_pixel(2, 2, [9, 9, 9]);
        composite(&mut bg, &fg, 0, 1);
        assert_eq!(fg, before);
    }
}
