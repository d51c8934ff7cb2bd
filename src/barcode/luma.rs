// SPDX-License-Identifier: GPL-3.0-only

//! Frame to upright grayscale conversion

use crate::backends::camera::types::{CameraFrame, PixelFormat, SensorRotation};
use crate::errors::DecodeError;
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::trace;

/// Convert a frame into an upright luma image no larger than `max_dimension`
///
/// Stride padding is dropped, color formats are reduced to luma and the
/// frame's rotation metadata is applied.
pub fn upright_luma(frame: &CameraFrame, max_dimension: u32) -> Result<GrayImage, DecodeError> {
    let start = std::time::Instant::now();
    let luma = strip_to_luma(frame)?;
    let luma = downscale(luma, max_dimension);
    let upright = rotate(luma, frame.rotation);

    trace!(
        width = upright.width(),
        height = upright.height(),
        rotation = %frame.rotation,
        conversion_ms = start.elapsed().as_millis() as u64,
        "Prepared luma image"
    );
    Ok(upright)
}

fn strip_to_luma(frame: &CameraFrame) -> Result<GrayImage, DecodeError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(DecodeError::EmptyFrame);
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let bpp = frame.format.bytes_per_pixel() as usize;
    let row_bytes = width * bpp;

    if stride < row_bytes {
        return Err(DecodeError::Malformed(format!(
            "stride {} is smaller than a row of {} bytes",
            stride, row_bytes
        )));
    }

    // NV12: only the Y plane is needed, which has the same layout as Gray8
    let required = stride * (height - 1) + row_bytes;
    if frame.data.len() < required {
        return Err(DecodeError::Malformed(format!(
            "buffer holds {} bytes, layout needs {}",
            frame.data.len(),
            required
        )));
    }

    let mut luma = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = &frame.data[y * stride..y * stride + row_bytes];
        match frame.format {
            PixelFormat::Gray8 | PixelFormat::NV12 => luma.extend_from_slice(row),
            PixelFormat::RGBA | PixelFormat::RGB24 => {
                luma.extend(row.chunks_exact(bpp).map(|px| rgb_to_luma(px[0], px[1], px[2])))
            }
        }
    }

    GrayImage::from_raw(frame.width, frame.height, luma)
        .ok_or_else(|| DecodeError::Malformed("luma buffer size mismatch".to_string()))
}

/// BT.601 luma in 8.8 fixed point
fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

fn downscale(image: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

fn rotate(image: GrayImage, rotation: SensorRotation) -> GrayImage {
    match rotation {
        SensorRotation::None => image,
        SensorRotation::Rotate90 => imageops::rotate90(&image),
        SensorRotation::Rotate180 => imageops::rotate180(&image),
        SensorRotation::Rotate270 => imageops::rotate270(&image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FrameData;
    use std::time::Instant;

    fn rgba_frame(data: Vec<u8>, width: u32, height: u32, stride: u32) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: FrameData::from(data),
            format: PixelFormat::RGBA,
            stride,
            rotation: SensorRotation::None,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_stride_padding_is_removed() {
        let data: Vec<u8> = vec![
            255, 255, 255, 255, // White pixel
            0, 0, 0, 255, // Black pixel
            9, 9, // stride padding
            0, 0, 0, 255, // Black pixel
            255, 255, 255, 255, // White pixel
            9, 9, // stride padding
        ];
        let luma = upright_luma(&rgba_frame(data, 2, 2, 10), 640).unwrap();
        assert_eq!(luma.as_raw(), &vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_short_buffer_is_malformed() {
        let frame = rgba_frame(vec![0; 12], 2, 2, 8);
        assert!(matches!(
            upright_luma(&frame, 640),
            Err(DecodeError::Malformed(_))
        ));

        let frame = rgba_frame(vec![0; 16], 2, 2, 4);
        assert!(matches!(
            upright_luma(&frame, 640),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_frame() {
        let frame = rgba_frame(Vec::new(), 0, 0, 0);
        assert_eq!(upright_luma(&frame, 640), Err(DecodeError::EmptyFrame));
    }

    #[test]
    fn test_rotation_is_applied() {
        let mut frame = CameraFrame::from_gray_image(
            GrayImage::from_fn(4, 2, |x, _| image::Luma([x as u8])),
            SensorRotation::Rotate90,
        );
        let luma = upright_luma(&frame, 640).unwrap();
        assert_eq!(luma.dimensions(), (2, 4));

        frame.rotation = SensorRotation::Rotate180;
        let luma = upright_luma(&frame, 640).unwrap();
        assert_eq!(luma.get_pixel(0, 0).0[0], 3);
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let frame = CameraFrame::from_gray_image(
            GrayImage::from_pixel(1600, 800, image::Luma([90])),
            SensorRotation::None,
        );
        let luma = upright_luma(&frame, 400).unwrap();
        assert_eq!(luma.dimensions(), (400, 200));
    }
}
