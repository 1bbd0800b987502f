use std::io::Cursor;

use crate::foundation::error::EngineError;
use crate::foundation::params::RenderParameters;
use crate::worker::dispatcher::{EngineInit, RenderEngine};

/// Container format recognised from a font file's leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFormat {
    /// `0x00010000` or `true`.
    TrueType,
    /// `OTTO`.
    OpenType,
    /// `ttcf`.
    Collection,
    /// `wOFF`.
    Woff,
    /// `wOF2`.
    Woff2,
}

/// Identify a font container by its magic number.
pub fn sniff_font_format(bytes: &[u8]) -> Option<FontFormat> {
    match bytes.get(..4)? {
        [0x00, 0x01, 0x00, 0x00] | b"true" => Some(FontFormat::TrueType),
        b"OTTO" => Some(FontFormat::OpenType),
        b"ttcf" => Some(FontFormat::Collection),
        b"wOFF" => Some(FontFormat::Woff),
        b"wOF2" => Some(FontFormat::Woff2),
        _ => None,
    }
}

/// Stand-in engine that checks its inputs and returns the source image as PNG.
///
/// No text or stripes are drawn.
#[derive(Debug, Default)]
pub struct PassthroughEngine {
    font: Option<FontFormat>,
    image: Option<image::DynamicImage>,
}

impl PassthroughEngine {
    /// Format of the current font, if one was set.
    pub fn font_format(&self) -> Option<FontFormat> {
        self.font
    }

    /// Width and height of the current image, if one was set.
    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| (img.width(), img.height()))
    }
}

impl RenderEngine for PassthroughEngine {
    fn set_font(&mut self, font: Vec<u8>) -> Result<(), EngineError> {
        let format = sniff_font_format(&font)
            .ok_or_else(|| EngineError::new("font data is not a TrueType, OpenType or WOFF file"))?;
        tracing::debug!(side = "worker", ?format, bytes = font.len(), "font loaded");
        self.font = Some(format);
        Ok(())
    }

    fn set_image(&mut self, image: Vec<u8>) -> Result<(), EngineError> {
        let decoded = image::load_from_memory(&image)
            .map_err(|err| EngineError::new(format!("decode image: {err}")))?;
        tracing::debug!(
            side = "worker",
            width = decoded.width(),
            height = decoded.height(),
            "image loaded"
        );
        self.image = Some(decoded);
        Ok(())
    }

    fn draw_image(&mut self, params: &RenderParameters) -> Result<Vec<u8>, EngineError> {
        params
            .validate()
            .map_err(|err| EngineError::new(err.to_string()))?;
        if self.font.is_none() {
            return Err(EngineError::new("font is not set"));
        }
        let Some(source) = self.image.as_ref() else {
            return Err(EngineError::new("image is not set"));
        };

        let mut out = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|err| EngineError::new(format!("encode png: {err}")))?;
        Ok(out)
    }
}

/// Initializer for [`PassthroughEngine`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughInit;

impl EngineInit for PassthroughInit {
    type Engine = PassthroughEngine;

    async fn init(&self) -> Result<PassthroughEngine, EngineError> {
        Ok(PassthroughEngine::default())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/passthrough.rs"]
mod tests;
