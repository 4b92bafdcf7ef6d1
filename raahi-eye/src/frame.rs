//! Owned RGB frames passed from capture to detection

use crate::error::VisionError;
use image::RgbImage;
use std::path::Path;

/// A single captured picture
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from tightly packed RGB bytes
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, VisionError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| VisionError::Processing("Frame dimensions overflow".to_string()))?;
        if pixels.len() != expected {
            return Err(VisionError::Processing(format!(
                "Expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        RgbImage::from_raw(width, height, pixels)
            .map(Self::new)
            .ok_or_else(|| VisionError::Processing("Invalid RGB buffer".to_string()))
    }

    /// Decode an encoded picture (JPEG, PNG, BMP)
    pub fn decode(bytes: &[u8]) -> Result<Self, VisionError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::new(image.to_rgb8()))
    }

    /// Load a picture from disk
    pub fn open(path: &Path) -> Result<Self, VisionError> {
        let image = image::open(path)?;
        Ok(Self::new(image.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Write the frame to disk; the format follows the file extension
    pub fn save(&self, path: &Path) -> Result<(), VisionError> {
        self.image.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_checks_length() {
        assert!(Frame::from_rgb(2, 2, vec![0; 12]).is_ok());
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_decode_roundtrip_png() {
        let frame = Frame::from_rgb(3, 2, vec![200; 18]).unwrap();
        let mut encoded = Vec::new();
        frame
            .image()
            .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageOutputFormat::Png)
            .unwrap();

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
        assert_eq!(decoded.image().get_pixel(1, 1).0, [200, 200, 200]);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(Frame::decode(b"not an image"), Err(VisionError::Image(_))));
    }
}
