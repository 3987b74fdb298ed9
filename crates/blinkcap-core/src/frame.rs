use std::time::Duration;

use image::{imageops, DynamicImage, RgbImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer holds {got} bytes, {expected} expected for {width}x{height} {format:?}")]
    BufferSize {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        got: usize,
    },
}

/// Pixel layout of a camera buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit BGRA, the usual layout of mobile video outputs.
    Bgra8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// Clockwise rotation needed to bring a sensor frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

/// How a raw frame relates to what the user saw on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Orientation {
    pub rotation: Rotation,
    /// Flip horizontally after rotating (front-facing sensors).
    pub mirrored: bool,
}

impl Orientation {
    /// Landscape front-camera buffer shown as a portrait selfie.
    pub const FRONT_PORTRAIT: Self = Self {
        rotation: Rotation::Cw90,
        mirrored: true,
    };
}

/// One camera frame as delivered by the camera lane.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    pub orientation: Orientation,
    /// Capture time on the camera's monotonic clock.
    pub timestamp: Duration,
}

impl RawFrame {
    /// Convert to an upright RGB still.
    ///
    /// Rotation and mirroring from [`Orientation`] are applied here and only
    /// here; the resulting [`CapturedImage`] carries no orientation.
    pub fn freeze(&self) -> Result<CapturedImage, FrameError> {
        let bpp = self.format.bytes_per_pixel();
        let expected = self.width as usize * self.height as usize * bpp;
        if self.data.len() < expected {
            return Err(FrameError::BufferSize {
                width: self.width,
                height: self.height,
                format: self.format,
                expected,
                got: self.data.len(),
            });
        }

        let mut rgb = RgbImage::new(self.width, self.height);
        for (dst, src) in rgb.pixels_mut().zip(self.data.chunks_exact(bpp)) {
            dst.0 = match self.format {
                PixelFormat::Bgra8 => [src[2], src[1], src[0]],
                PixelFormat::Rgb8 => [src[0], src[1], src[2]],
            };
        }

        let rotated = match self.orientation.rotation {
            Rotation::None => rgb,
            Rotation::Cw90 => imageops::rotate90(&rgb),
            Rotation::Cw180 => imageops::rotate180(&rgb),
            Rotation::Cw270 => imageops::rotate270(&rgb),
        };
        let upright = if self.orientation.mirrored {
            imageops::flip_horizontal(&rotated)
        } else {
            rotated
        };

        Ok(CapturedImage::new(DynamicImage::ImageRgb8(upright)))
    }
}

/// Upright raster produced by freezing a frame, scanning, or cropping.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    image: DynamicImage,
}

impl CapturedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

impl From<DynamicImage> for CapturedImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}
