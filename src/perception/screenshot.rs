use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;

use crate::errors::{CuaError, CuaResult};
use crate::perception::types::Dimensions;

/// One screenshot handed to the agent: the raw encoded image bytes, as read from disk.
#[derive(Debug, Clone)]
pub struct Observation {
    pub screenshot: Vec<u8>,
}

impl Observation {
    pub fn new(screenshot: Vec<u8>) -> Self {
        Self { screenshot }
    }

    pub async fn from_file(path: &Path) -> CuaResult<Self> {
        let screenshot = tokio::fs::read(path).await?;
        Ok(Self { screenshot })
    }

    /// Read the pixel size from the image header without decoding pixels.
    pub fn dimensions(&self) -> CuaResult<Dimensions> {
        if self.screenshot.is_empty() {
            return Err(CuaError::Observation("empty screenshot".into()));
        }
        let (width, height) = image::ImageReader::new(Cursor::new(&self.screenshot))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Dimensions::new(width, height))
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.screenshot)
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::new(width, height);
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_from_png() {
        let obs = Observation::new(png_bytes(64, 32));
        assert_eq!(obs.dimensions().unwrap(), Dimensions::new(64, 32));
    }

    #[test]
    fn test_dimensions_of_garbage_is_error() {
        assert!(Observation::new(b"not an image".to_vec()).dimensions().is_err());
        assert!(matches!(
            Observation::new(Vec::new()).dimensions(),
            Err(CuaError::Observation(_))
        ));
    }

    #[test]
    fn test_to_base64() {
        assert_eq!(Observation::new(b"ABC".to_vec()).to_base64(), "QUJD");
    }
}
