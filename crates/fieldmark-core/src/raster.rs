//! Raster images for embedding as PDF image XObjects
//!
//! Pixels are split into a color plane (DeviceGray or DeviceRGB) and, when the
//! source has an alpha channel, a DeviceGray soft mask. Both planes are stored
//! Flate-compressed.

use crate::error::{FieldmarkError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat, RgbaImage};
use lopdf::{dictionary, Document, ObjectId, Stream};
use std::io::{Cursor, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
}

impl ColorSpace {
    fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
        }
    }
}

/// 8-bit image split into color and alpha planes
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub pixels: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// Decode PNG bytes into 8-bit planes.
pub fn decode_png(bytes: &[u8]) -> Result<DecodedImage> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| FieldmarkError::Image(format!("Invalid PNG: {}", e)))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(FieldmarkError::Image("PNG has zero size".into()));
    }

    let pixel_count = width as usize * height as usize;
    let has_alpha = img.color().has_alpha();
    let decoded = if img.color().has_color() {
        if has_alpha {
            let rgba = img.to_rgba8();
            let mut pixels = Vec::with_capacity(pixel_count * 3);
            let mut alpha = Vec::with_capacity(pixel_count);
            for pixel in rgba.pixels() {
                pixels.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
            }
            DecodedImage {
                width,
                height,
                color_space: ColorSpace::DeviceRgb,
                pixels,
                alpha: Some(alpha),
            }
        } else {
            DecodedImage {
                width,
                height,
                color_space: ColorSpace::DeviceRgb,
                pixels: img.to_rgb8().into_raw(),
                alpha: None,
            }
        }
    } else if has_alpha {
        let gray_alpha = img.to_luma_alpha8();
        let mut pixels = Vec::with_capacity(pixel_count);
        let mut alpha = Vec::with_capacity(pixel_count);
        for pixel in gray_alpha.pixels() {
            pixels.push(pixel.0[0]);
            alpha.push(pixel.0[1]);
        }
        DecodedImage {
            width,
            height,
            color_space: ColorSpace::DeviceGray,
            pixels,
            alpha: Some(alpha),
        }
    } else {
        DecodedImage {
            width,
            height,
            color_space: ColorSpace::DeviceGray,
            pixels: img.to_luma8().into_raw(),
            alpha: None,
        }
    };
    Ok(decoded)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| FieldmarkError::Image(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| FieldmarkError::Image(format!("Compression failed: {}", e)))
}

/// Add the image (and its soft mask) to the document, returning the image
/// XObject id.
pub fn add_image_xobject(doc: &mut Document, image: &DecodedImage) -> Result<ObjectId> {
    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space.pdf_name(),
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &image.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(alpha)?,
        );
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", smask_id);
    }

    let stream = Stream::new(image_dict, deflate(&image.pixels)?);
    Ok(doc.add_object(stream))
}

/// Encode an image as PNG, keeping its color type
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageOutputFormat::Png)
        .map_err(|e| FieldmarkError::Image(format!("PNG encode failed: {}", e)))?;
    Ok(out.into_inner())
}

/// Encode a raw RGBA buffer as PNG
pub fn encode_rgba_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>> {
    let image = RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or_else(|| {
        FieldmarkError::Image(format!(
            "RGBA buffer of {} bytes does not match {}x{}",
            rgba.len(),
            width,
            height
        ))
    })?;
    encode_png(&DynamicImage::ImageRgba8(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use image::{GrayAlphaImage, LumaA, Rgb, RgbImage};
    use std::io::Read;

    #[test]
    fn test_rgba_splits_alpha_plane() {
        let rgba = [10, 20, 30, 255, 40, 50, 60, 0];
        let png_bytes = encode_rgba_png(2, 1, &rgba).unwrap();
        let image = decode_png(&png_bytes).unwrap();
        assert_eq!(image.color_space, ColorSpace::DeviceRgb);
        assert_eq!(image.pixels, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(image.alpha, Some(vec![255, 0]));
    }

    #[test]
    fn test_rgb_has_no_mask() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([200, 200, 200])));
        let image = decode_png(&encode_png(&rgb).unwrap()).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixels.len(), 18);
        assert!(image.alpha.is_none());
    }

    #[test]
    fn test_gray_alpha_stays_gray() {
        let gray = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(2, 2, LumaA([7, 99])));
        let image = decode_png(&encode_png(&gray).unwrap()).unwrap();
        assert_eq!(image.color_space, ColorSpace::DeviceGray);
        assert_eq!(image.pixels, vec![7; 4]);
        assert_eq!(image.alpha, Some(vec![99; 4]));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = decode_png(b"definitely not a png").unwrap_err();
        assert!(matches!(err, FieldmarkError::Image(_)));
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        assert!(matches!(
            encode_rgba_png(2, 2, &[0; 3]),
            Err(FieldmarkError::Image(_))
        ));
    }

    #[test]
    fn test_xobject_has_smask_and_flate_data() {
        let png_bytes = encode_rgba_png(1, 1, &[1, 2, 3, 128]).unwrap();
        let image = decode_png(&png_bytes).unwrap();
        let mut doc = Document::with_version("1.7");
        let id = add_image_xobject(&mut doc, &image).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"SMask").is_ok());

        let mut raw = Vec::new();
        ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw, vec![1, 2, 3]);
    }
}
