//! Image normalisation: any submitted format → canonical RGB JPEG.
//!
//! Submitters upload whatever their phone or scanner produced: JPEG, PNG,
//! HEIC, sometimes a one-page PDF from a print-scan kiosk. The oracle gets
//! exactly one format, so everything funnels through here.
//!
//! ## Decode order
//!
//! Buffers carrying the `%PDF` magic are tried as paginated documents
//! first: the first page is rendered at the configured DPI and converted to
//! three-channel colour. On any rendering failure — and for every other
//! buffer — the bytes go to the generic still-image decoders (plus HEIC
//! behind the `heic` feature). Only when all stages fail is the row lost to
//! `UnsupportedFormat`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts; image decoding is CPU-heavy besides.
//! `tokio::task::spawn_blocking` moves the work onto the blocking thread
//! pool so Tokio worker threads never stall mid-decode.

use crate::error::RowError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Canonical JPEG bytes ready for the oracle.
#[derive(Debug, Clone)]
pub struct CanonicalImage {
    bytes: Vec<u8>,
}

impl CanonicalImage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64-wrap the JPEG for a multimodal API request body.
    ///
    /// `detail: "high"` instructs GPT-4-class models to use the full image
    /// tile budget; cuticle lines and polish edges vanish at low detail.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(STANDARD.encode(&self.bytes), "image/jpeg").with_detail("high")
    }

    #[cfg(test)]
    pub(crate) fn from_raw(bytes: Vec<u8>) -> Self {
        CanonicalImage { bytes }
    }
}

/// Normalise raw photo bytes into a canonical RGB JPEG.
///
/// Runs the decoders on the blocking thread pool.
pub async fn normalize(bytes: Vec<u8>, dpi: u32, jpeg_quality: u8) -> Result<CanonicalImage, RowError> {
    let result = tokio::task::spawn_blocking(move || normalize_blocking(&bytes, dpi, jpeg_quality))
        .await
        .map_err(|e| RowError::UnsupportedFormat {
            detail: format!("decode task panicked: {e}"),
        })?;
    result
}

/// Blocking implementation of normalisation.
fn normalize_blocking(bytes: &[u8], dpi: u32, jpeg_quality: u8) -> Result<CanonicalImage, RowError> {
    // Only PDF-magic buffers are worth a pdfium round trip.
    let decoded = if looks_like_pdf(bytes) {
        match first_pdf_page(bytes, dpi) {
            Ok(image) => image,
            Err(detail) => {
                debug!("not renderable as a document ({detail}), decoding as still image");
                decode_still(bytes)?
            }
        }
    } else {
        decode_still(bytes)?
    };
    encode_jpeg(&decoded, jpeg_quality)
}

/// `%PDF` magic sniff for paginated-document input.
fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Bind pdfium from the working directory or the system, if present at all.
///
/// The library being absent is not fatal: PDF references are rare in most
/// sheets, and still images keep working without it.
fn bind_pdfium() -> Option<Pdfium> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .ok()
}

/// Render the first page of a PDF at the given DPI.
fn first_pdf_page(bytes: &[u8], dpi: u32) -> Result<DynamicImage, String> {
    let pdfium = bind_pdfium().ok_or_else(|| "pdfium library not available".to_string())?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("{e:?}"))?;
    let pages = document.pages();
    if pages.len() == 0 {
        return Err("document has no pages".to_string());
    }
    let page = pages.get(0).map_err(|e| format!("{e:?}"))?;

    // Page geometry is in points (1/72 inch); scale the render to the DPI.
    let width_px = (page.width().value / 72.0 * dpi as f32).round().max(1.0) as i32;
    let render_config = PdfRenderConfig::new().set_target_width(width_px);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| format!("{e:?}"))?;
    let image = bitmap.as_image();
    debug!("rendered PDF page 1 → {}x{} px at {} dpi", image.width(), image.height(), dpi);
    Ok(image)
}

/// Decode any still-image format the stack understands.
fn decode_still(bytes: &[u8]) -> Result<DynamicImage, RowError> {
    let err = match image::load_from_memory(bytes) {
        Ok(image) => return Ok(image),
        Err(e) => e,
    };
    if looks_like_heic(bytes) {
        return decode_heic(bytes);
    }
    Err(RowError::UnsupportedFormat {
        detail: err.to_string(),
    })
}

/// ISO-BMFF `ftyp` sniff for the HEIF family of brands.
fn looks_like_heic(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    matches!(
        &bytes[8..12],
        b"heic" | b"heix" | b"hevc" | b"heif" | b"mif1" | b"msf1"
    )
}

#[cfg(feature = "heic")]
fn decode_heic(bytes: &[u8]) -> Result<DynamicImage, RowError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_err = |e: libheif_rs::HeifError| RowError::UnsupportedFormat {
        detail: format!("HEIC decode: {e}"),
    };

    let lib = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes).map_err(heif_err)?;
    let handle = ctx.primary_image_handle().map_err(heif_err)?;
    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif_err)?;

    let planes = decoded.planes();
    let plane = planes.interleaved.ok_or_else(|| RowError::UnsupportedFormat {
        detail: "HEIC decode: no interleaved RGB plane".to_string(),
    })?;

    // Rows are padded to the stride; copy pixel rows only.
    let stride = plane.stride;
    let mut rgb = image::RgbImage::new(plane.width, plane.height);
    for (y, row) in plane.data.chunks(stride).take(plane.height as usize).enumerate() {
        for x in 0..plane.width as usize {
            let i = x * 3;
            rgb.put_pixel(x as u32, y as u32, image::Rgb([row[i], row[i + 1], row[i + 2]]));
        }
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

#[cfg(not(feature = "heic"))]
fn decode_heic(_bytes: &[u8]) -> Result<DynamicImage, RowError> {
    Err(RowError::UnsupportedFormat {
        detail: "HEIC photo; rebuild with the `heic` feature to decode it".to_string(),
    })
}

/// Re-encode as an RGB JPEG at the configured quality.
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<CanonicalImage, RowError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| RowError::UnsupportedFormat {
            detail: format!("JPEG encode: {e}"),
        })?;
    debug!("canonical JPEG: {} bytes at quality {}", buf.len(), quality);
    Ok(CanonicalImage { bytes: buf })
}
