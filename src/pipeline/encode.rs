//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. PNG is lossless, so small slide text and chart labels stay crisp;
//! JPEG artefacts around glyphs are exactly what a typo check must not see.

use super::render::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page ready to attach to a review request.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// 1-based page number.
    pub page: u32,
    pub image: ImageData,
}

impl EncodedPage {
    /// `data:image/png;base64,…` form of the image.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.image.mime_type, self.image.data)
    }
}

/// PNG-encode a raster into raw bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a rasterised page as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` lets GPT-4-class models tile the full image; the low
/// detail mode downsamples to a single 512 px tile and loses footnotes.
pub fn encode_page(page: &PageImage) -> Result<EncodedPage, image::ImageError> {
    let png = png_bytes(&page.image)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded page {} → {} bytes base64", page.page, b64.len());

    Ok(EncodedPage {
        page: page.page,
        image: ImageData::new(b64, "image/png").with_detail("high"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_page(page: u32) -> PageImage {
        PageImage {
            page,
            image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))),
        }
    }

    #[test]
    fn encode_small_image() {
        let encoded = encode_page(&red_page(4)).expect("encode should succeed");
        assert_eq!(encoded.page, 4);
        assert_eq!(encoded.image.mime_type, "image/png");
        let decoded = STANDARD.decode(&encoded.image.data).expect("valid base64");
        assert_eq!(&decoded[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn data_uri_prefix() {
        let encoded = encode_page(&red_page(1)).unwrap();
        let uri = encoded.data_uri();
        assert!(uri.starts_with("data:image/png;base64,iVBOR"), "got {}", &uri[..40]);
    }
}
