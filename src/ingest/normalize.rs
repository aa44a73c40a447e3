use anyhow::{anyhow, Result};

use crate::frame::rgb_len;

/// Nearest-neighbour resize of a packed RGB24 buffer.
pub(crate) fn resize_nearest(
    pixels: &[u8],
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> Result<Vec<u8>> {
    let expected = rgb_len(width, height)?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "RGB frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }
    if width == 0 || height == 0 {
        return Err(anyhow!("cannot resize an empty frame"));
    }
    if target_width == 0 || target_height == 0 {
        return Err(anyhow!("resize target must be non-empty"));
    }

    let (sw, sh) = (width as usize, height as usize);
    let (tw, th) = (target_width as usize, target_height as usize);
    let mut out = vec![0u8; rgb_len(target_width, target_height)?];
    for j in 0..th {
        let sy = (j * sh / th).min(sh - 1);
        for i in 0..tw {
            let sx = (i * sw / tw).min(sw - 1);
            let src = (sy * sw + sx) * 3;
            let dst = (j * tw + i) * 3;
            out[dst..dst + 3].copy_from_slice(&pixels[src..src + 3]);
        }
    }
    Ok(out)
}

/// Mirror a packed RGB24 buffer left to right, in place.
pub(crate) fn flip_horizontal(pixels: &mut [u8], width: u32, height: u32) -> Result<()> {
    let expected = rgb_len(width, height)?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "RGB frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }
    let row_len = width as usize * 3;
    if row_len == 0 {
        return Ok(());
    }
    for row in pixels.chunks_exact_mut(row_len) {
        let w = width as usize;
        for i in 0..w / 2 {
            let (left, right) = (i * 3, (w - 1 - i) * 3);
            for c in 0..3 {
                row.swap(left + c, right + c);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscale_picks_top_left_samples() -> Result<()> {
        // 2x2 image, each pixel a distinct gray level
        let pixels = vec![10, 10, 10, 20, 20, 20, 30, 30, 30, 40, 40, 40];
        let out = resize_nearest(&pixels, 2, 2, 1, 1)?;
        assert_eq!(out, vec![10, 10, 10]);
        Ok(())
    }

    #[test]
    fn upscale_repeats_pixels() -> Result<()> {
        let pixels = vec![1, 2, 3];
        let out = resize_nearest(&pixels, 1, 1, 2, 2)?;
        assert_eq!(out, [1, 2, 3].repeat(4));
        Ok(())
    }

    #[test]
    fn flip_mirrors_each_row() -> Result<()> {
        // 3x2 image: row 0 = 1,2,3 and row 1 = 4,5,6 (one gray level per pixel)
        let mut pixels: Vec<u8> = [1u8, 2, 3, 4, 5, 6].iter().flat_map(|&v| [v; 3]).collect();
        flip_horizontal(&mut pixels, 3, 2)?;
        let expected: Vec<u8> = [3u8, 2, 1, 6, 5, 4].iter().flat_map(|&v| [v; 3]).collect();
        assert_eq!(pixels, expected);
        Ok(())
    }

    #[test]
    fn flip_rejects_length_mismatch() {
        let mut pixels = vec![0u8; 5];
        assert!(flip_horizontal(&mut pixels, 2, 1).is_err());
    }

    #[test]
    fn rejects_zero_target() {
        assert!(resize_nearest(&[0, 0, 0], 1, 1, 0, 4).is_err());
    }
}
