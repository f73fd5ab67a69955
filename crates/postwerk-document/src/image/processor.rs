// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode image XObjects pulled out of a PDF, load artwork
// from disk, crop and downscale, and re-encode as a PDF image stream. Operates
// on in-memory images using the `image` crate.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use postwerk_core::error::{PostwerkError, Result};
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Transformations consume `self` and return a new `ImageProcessor`, so calls
/// chain:
///
/// ```ignore
/// let thumbnail = ImageProcessor::from_pdf_stream(&doc, qr)?
///     .crop(70, 450, 280, 280)
///     .downscale(5)
///     .add_to_document(&mut doc)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            PostwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| PostwerkError::ImageError(format!("failed to decode image: {}", err)))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Decode an image XObject stream.
    ///
    /// Handles DCT (JPEG) streams and raw or Flate-compressed samples in
    /// DeviceGray, DeviceRGB or ICC-based colour spaces at 8 bits per
    /// component, plus 1-bit grayscale.
    pub fn from_pdf_stream(doc: &Document, stream: &Stream) -> Result<Self> {
        let dict = &stream.dict;
        let width = integer(dict, b"Width")?;
        let height = integer(dict, b"Height")?;

        if filters(dict).iter().any(|filter| filter == b"DCTDecode") {
            let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|err| PostwerkError::ImageError(format!("JPEG image: {err}")))?;
            return Ok(Self { image: img });
        }

        let samples = if dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|err| PostwerkError::ImageError(format!("cannot decompress image: {err}")))?
        } else {
            stream.content.clone()
        };

        let components = colour_components(doc, dict)?;
        let bits = dict
            .get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8);

        let image = match (components, bits) {
            (1, 8) => GrayImage::from_raw(width, height, fit(samples, sample_len(width, height, 1)?)?)
                .map(DynamicImage::ImageLuma8),
            (3, 8) => RgbImage::from_raw(width, height, fit(samples, sample_len(width, height, 3)?)?)
                .map(DynamicImage::ImageRgb8),
            (1, 1) => Some(DynamicImage::ImageLuma8(unpack_bits(&samples, width, height)?)),
            (components, bits) => {
                return Err(PostwerkError::ImageError(format!(
                    "unsupported image layout: {components} components at {bits} bits"
                )));
            }
        };

        image
            .map(|image| Self { image })
            .ok_or_else(|| PostwerkError::ImageError("image samples do not fit dimensions".into()))
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Crop a rectangular region from the image.
    ///
    /// `x` and `y` are the top-left corner; `width` and `height` define the
    /// size of the crop rectangle. Values are clamped to image bounds.
    #[instrument(skip(self), fields(x, y, width, height))]
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();

        let safe_x = x.min(img_w.saturating_sub(1));
        let safe_y = y.min(img_h.saturating_sub(1));
        let safe_w = width.min(img_w - safe_x);
        let safe_h = height.min(img_h - safe_y);

        debug!(safe_x, safe_y, safe_w, safe_h, "Cropping image");

        let cropped = self.image.crop_imm(safe_x, safe_y, safe_w, safe_h);
        Self { image: cropped }
    }

    /// Shrink both dimensions by an integer factor.
    pub fn downscale(self, factor: u32) -> Self {
        let factor = factor.max(1);
        let width = (self.image.width() / factor).max(1);
        let height = (self.image.height() / factor).max(1);
        let resized = self
            .image
            .resize_exact(width, height, image::imageops::FilterType::Triangle);
        Self { image: resized }
    }

    // -- Output ---------------------------------------------------------------

    /// Add the current image to `doc` as a Flate-compressed DeviceRGB image
    /// XObject and return its id.
    ///
    /// An alpha channel becomes a DeviceGray `/SMask`, so transparent
    /// artwork stays transparent on the page.
    pub fn add_to_document(&self, doc: &mut Document) -> Result<ObjectId> {
        let (width, height) = (self.image.width(), self.image.height());
        let mut image = image_stream(width, height, "DeviceRGB", self.image.to_rgb8().into_raw())?;

        if self.image.color().has_alpha() {
            let alpha: Vec<u8> = self
                .image
                .to_rgba8()
                .pixels()
                .map(|pixel| pixel.0[3])
                .collect();
            let mask = doc.add_object(image_stream(width, height, "DeviceGray", alpha)?);
            image.dict.set("SMask", mask);
            debug!(width, height, "Image written with soft mask");
        }
        Ok(doc.add_object(image))
    }
}

fn image_stream(width: u32, height: u32, colour_space: &str, samples: Vec<u8>) -> Result<Stream> {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => colour_space,
        "BitsPerComponent" => 8,
    };
    let mut stream = Stream::new(dict, samples);
    stream
        .compress()
        .map_err(|err| PostwerkError::ImageError(format!("cannot compress image: {err}")))?;
    Ok(stream)
}

/// Bytes of 8-bit samples for a `width` x `height` image.
fn sample_len(width: u32, height: u32, components: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(components))
        .ok_or_else(|| {
            PostwerkError::ImageError(format!(
                "image of {width}x{height} with {components} components is too large"
            ))
        })
}

fn integer(dict: &lopdf::Dictionary, key: &[u8]) -> Result<u32> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            PostwerkError::ImageError(format!(
                "image has no usable /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

fn filters(dict: &lopdf::Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of colour components named by `/ColorSpace`.
fn colour_components(doc: &Document, dict: &lopdf::Dictionary) -> Result<u32> {
    let space = match dict.get(b"ColorSpace") {
        Ok(object) => crate::pdf::resolve(doc, object)?,
        Err(_) => return Ok(1),
    };
    match space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Ok(1),
            b"DeviceRGB" | b"CalRGB" => Ok(3),
            other => Err(PostwerkError::ImageError(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Array(items) => match items.first().and_then(|first| first.as_name().ok()) {
            Some(b"ICCBased") => {
                let profile = items
                    .get(1)
                    .ok_or_else(|| PostwerkError::ImageError("ICCBased without profile".into()))?;
                let n = crate::pdf::resolve(doc, profile)?
                    .as_stream()
                    .ok()
                    .and_then(|profile| profile.dict.get(b"N").and_then(Object::as_i64).ok())
                    .unwrap_or(3);
                Ok(n as u32)
            }
            Some(b"CalGray") => Ok(1),
            Some(b"CalRGB") => Ok(3),
            _ => Err(PostwerkError::ImageError("unsupported colour space array".into())),
        },
        _ => Err(PostwerkError::ImageError("malformed /ColorSpace".into())),
    }
}

/// Trim surplus padding; refuse short sample data.
fn fit(mut samples: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if samples.len() < expected {
        return Err(PostwerkError::ImageError(format!(
            "image has {} bytes of samples, expected {}",
            samples.len(),
            expected
        )));
    }
    samples.truncate(expected);
    Ok(samples)
}

/// Expand 1-bit rows (each padded to a whole byte) to 8-bit luma.
fn unpack_bits(samples: &[u8], width: u32, height: u32) -> Result<GrayImage> {
    let row_bytes = width.div_ceil(8) as usize;
    let needed = row_bytes
        .checked_mul(height as usize)
        .ok_or_else(|| PostwerkError::ImageError("1-bit image is too large".into()))?;
    if samples.len() < needed {
        return Err(PostwerkError::ImageError("1-bit image data is truncated".into()));
    }
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let byte = samples[y as usize * row_bytes + (x / 8) as usize];
        let bit = (byte >> (7 - (x % 8))) & 1;
        image::Luma([if bit == 1 { 255 } else { 0 }])
    }))
}
