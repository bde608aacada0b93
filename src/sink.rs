//! The persistence step.
//!
//! The driver decides *that* a frame is ready and *where* it should go; a
//! [`FrameSink`] decides how it is written. Two sinks ship with the crate:
//!
//! - [`LogSink`] writes nothing and only logs the path each frame would get.
//! - [`ImageSink`] converts FFmpeg frames to packed pixels and encodes them
//!   with the `image` crate, picking the format from the file extension.

use std::fs;
use std::path::Path;

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::configuration::PixelFormat;
use crate::error::SinkError;
use crate::frame::DecodedFrame;

/// Receives each extracted frame together with its output path.
///
/// The frame borrows the session's decode buffer and is only valid for the
/// duration of the call.
pub trait FrameSink<F> {
    /// Write `frame` to `path`.
    fn persist(&mut self, frame: &DecodedFrame<'_, F>, path: &Path) -> Result<(), SinkError>;
}

impl<F, S: FrameSink<F> + ?Sized> FrameSink<F> for &mut S {
    fn persist(&mut self, frame: &DecodedFrame<'_, F>, path: &Path) -> Result<(), SinkError> {
        (**self).persist(frame, path)
    }
}

/// A sink that only logs where each frame would have been written.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl<F> FrameSink<F> for LogSink {
    fn persist(&mut self, frame: &DecodedFrame<'_, F>, path: &Path) -> Result<(), SinkError> {
        log::info!(
            "Extracted frame {} to {}",
            frame.sequence_index(),
            path.display()
        );
        Ok(())
    }
}

struct CachedScaler {
    source: (Pixel, u32, u32),
    context: ScalingContext,
}

/// Encodes FFmpeg frames into image files.
///
/// Frames are converted to the configured [`PixelFormat`] at their source
/// resolution. Missing parent directories are created. Existing files are
/// left alone unless [`overwrite`](ImageSink::overwrite) is enabled.
pub struct ImageSink {
    pixel_format: PixelFormat,
    overwrite: bool,
    scaler: Option<CachedScaler>,
    converted: VideoFrame,
}

impl Default for ImageSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSink {
    /// Create a sink writing RGB images that refuses to overwrite.
    pub fn new() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            overwrite: false,
            scaler: None,
            converted: VideoFrame::empty(),
        }
    }

    /// Set the pixel layout of written images.
    #[must_use]
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Allow replacing files that already exist.
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Convert a decoded frame into a [`DynamicImage`].
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Conversion`] if the frame has no size or the
    /// scaler cannot handle its pixel format.
    pub fn to_image(&mut self, frame: &VideoFrame) -> Result<DynamicImage, SinkError> {
        let width = frame.width();
        let height = frame.height();
        if width == 0 || height == 0 {
            return Err(SinkError::Conversion(format!(
                "decoded frame has no size ({width}x{height})"
            )));
        }

        let source = (frame.format(), width, height);
        let stale = self
            .scaler
            .as_ref()
            .is_none_or(|cached| cached.source != source);
        if stale {
            let context = ScalingContext::get(
                frame.format(),
                width,
                height,
                self.pixel_format.to_ffmpeg_pixel(),
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some(CachedScaler { source, context });
        }

        let Some(cached) = self.scaler.as_mut() else {
            return Err(SinkError::Conversion("scaler unavailable".to_string()));
        };
        cached.context.run(frame, &mut self.converted)?;

        let buffer = packed_plane(&self.converted, width, height, self.pixel_format.bytes_per_pixel());
        let invalid = || {
            SinkError::Conversion("converted buffer does not match the frame size".to_string())
        };

        let image = match self.pixel_format {
            PixelFormat::Rgb8 => {
                DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, buffer).ok_or_else(invalid)?)
            }
            PixelFormat::Rgba8 => {
                DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, buffer).ok_or_else(invalid)?)
            }
            PixelFormat::Gray8 => {
                DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, buffer).ok_or_else(invalid)?)
            }
        };
        Ok(image)
    }
}

impl FrameSink<VideoFrame> for ImageSink {
    fn persist(
        &mut self,
        frame: &DecodedFrame<'_, VideoFrame>,
        path: &Path,
    ) -> Result<(), SinkError> {
        if path.exists() && !self.overwrite {
            return Err(SinkError::AlreadyExists(path.to_path_buf()));
        }

        let image = self.to_image(frame.pixels())?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        image.save(path)?;
        log::info!(
            "Extracted frame {} to {}",
            frame.sequence_index(),
            path.display()
        );
        Ok(())
    }
}

/// Copy the first plane of `frame` into a tightly packed buffer, dropping
/// per-row padding.
fn packed_plane(frame: &VideoFrame, width: u32, height: u32, bytes_per_pixel: usize) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * bytes_per_pixel;
    let rows = height as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        return data[..row_bytes * rows].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let start = row * stride;
        buffer.extend_from_slice(&data[start..start + row_bytes]);
    }
    buffer
}
