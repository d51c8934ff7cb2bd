// SPDX-License-Identifier: GPL-3.0-only

//! QR code recognition using rqrr

use image::GrayImage;
use tracing::{debug, trace};

/// Decode the first readable QR code in an upright luma image
///
/// Grids that are detected but fail to decode are skipped.
pub fn decode(image: &GrayImage) -> Option<String> {
    let start = std::time::Instant::now();
    let (width, height) = image.dimensions();

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| image.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    trace!(
        count = grids.len(),
        detection_ms = start.elapsed().as_millis() as u64,
        "QR grid detection complete"
    );

    grids.into_iter().find_map(|grid| match grid.decode() {
        Ok((meta, content)) => {
            debug!(version = meta.version.0, "Decoded QR code");
            Some(content)
        }
        Err(e) => {
            debug!(error = ?e, "Failed to decode QR grid");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_image_has_no_qr() {
        let blank = GrayImage::from_pixel(200, 200, image::Luma([255]));
        assert_eq!(decode(&blank), None);
    }

    #[test]
    fn test_noise_is_not_a_qr() {
        let stripes =
            GrayImage::from_fn(120, 120, |x, _| image::Luma([if x % 7 < 3 { 0 } else { 255 }]));
        assert_eq!(decode(&stripes), None);
    }
}
