use crate::error::AnalysisError;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageOutputFormat, RgbImage, RgbaImage,
};
use std::path::Path;

/// A raw `height x width x channels` grid of 8-bit samples, row-major.
///
/// Channel counts map to colour modes: 1 gray, 2 gray + alpha, 3 RGB, 4 RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelArray {
    height: u32,
    width: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelArray {
    pub fn new(height: u32, width: u32, channels: u8, data: Vec<u8>) -> Result<Self, AnalysisError> {
        if height == 0 || width == 0 {
            return Err(AnalysisError::InvalidFormat(format!(
                "empty pixel array ({height}x{width})"
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(AnalysisError::InvalidFormat(format!(
                "unsupported channel count: {channels}"
            )));
        }
        let expected = (height as usize)
            .checked_mul(width as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or_else(|| {
                AnalysisError::InvalidFormat(format!(
                    "pixel array too large ({height}x{width}x{channels})"
                ))
            })?;
        if data.len() != expected {
            return Err(AnalysisError::InvalidFormat(format!(
                "expected {expected} samples for {height}x{width}x{channels}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            height,
            width,
            channels,
            data,
        })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Wraps the samples in a decoded image of the matching colour mode.
    pub fn into_dynamic(self) -> Result<DynamicImage, AnalysisError> {
        let (w, h) = (self.width, self.height);
        let image = match self.channels {
            1 => GrayImage::from_raw(w, h, self.data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, self.data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgba8),
            _ => None,
        };
        image.ok_or_else(|| {
            AnalysisError::InvalidFormat(format!(
                "cannot build a {}-channel image from the pixel array",
                self.channels
            ))
        })
    }
}

/// An image as it arrives from the interaction surface.
#[derive(Debug, Clone)]
pub enum UploadedImage {
    /// A raw pixel grid.
    Pixels(PixelArray),
    /// An already decoded image, in any colour mode.
    Decoded(DynamicImage),
    /// The bytes of an uploaded file, in any format the decoder knows.
    Encoded(Vec<u8>),
}

/// Converts any uploaded representation into a 3-channel RGB image.
pub fn normalize(upload: UploadedImage) -> Result<RgbImage, AnalysisError> {
    let decoded = match upload {
        UploadedImage::Pixels(pixels) => pixels.into_dynamic()?,
        UploadedImage::Decoded(image) => image,
        UploadedImage::Encoded(bytes) => {
            if bytes.is_empty() {
                return Err(AnalysisError::InvalidFormat("empty upload".to_string()));
            }
            image::load_from_memory(&bytes)
                .map_err(|e| AnalysisError::InvalidFormat(e.to_string()))?
        }
    };
    Ok(decoded.to_rgb8())
}

/// A PNG written for the lifetime of one request.
///
/// Every file gets a unique name inside the scratch directory and is removed
/// from disk when the value is dropped.
pub struct TempImageFile {
    file: tempfile::NamedTempFile,
}

impl TempImageFile {
    pub fn write_rgb(dir: &Path, image: RgbImage) -> Result<Self, AnalysisError> {
        let mut file = tempfile::Builder::new()
            .prefix("medscan-")
            .suffix(".png")
            .tempfile_in(dir)?;

        DynamicImage::ImageRgb8(image)
            .write_to(file.as_file_mut(), ImageOutputFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => AnalysisError::Io(io),
                other => AnalysisError::InvalidFormat(other.to_string()),
            })?;
        file.as_file_mut().sync_all()?;

        log::debug!("Wrote temporary image {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Removes the file now, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<(), AnalysisError> {
        self.file.close()?;
        Ok(())
    }
}

/// Normalizes the upload and persists it, returning the scoped file.
pub fn persist_upload(dir: &Path, upload: UploadedImage) -> Result<TempImageFile, AnalysisError> {
    let rgb = normalize(upload)?;
    TempImageFile::write_rgb(dir, rgb)
}
