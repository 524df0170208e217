//! Image snippets for the stylesheet: inline SVG markup or a base64 data URI.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::{self, FromStr};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageInsertMode {
    /// `<img src="data:...;base64,...">`
    #[default]
    Base64,
    /// The SVG document pasted as markup.
    SvgInline,
}

impl ImageInsertMode {
    pub const ALL: [ImageInsertMode; 2] = [ImageInsertMode::Base64, ImageInsertMode::SvgInline];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageInsertMode::Base64 => "base64",
            ImageInsertMode::SvgInline => "svg-inline",
        }
    }

    /// Inline markup for SVG files, a data URI for everything else.
    pub fn for_path(path: &Path) -> Self {
        if mime_for(path) == SVG_MIME {
            ImageInsertMode::SvgInline
        } else {
            ImageInsertMode::Base64
        }
    }
}

impl fmt::Display for ImageInsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageInsertMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| format!("unknown image mode '{}' (base64, svg-inline)", s.trim()))
    }
}

const SVG_MIME: &str = "image/svg+xml";

/// MIME type guessed from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "svg" => SVG_MIME,
        _ => "application/octet-stream",
    }
}

/// An image file read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageAsset {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self {
            name,
            mime: mime_for(path),
            bytes,
        })
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            STANDARD.encode(&self.bytes)
        )
    }

    /// Markup to drop into the stylesheet, with a marker comment.
    pub fn snippet(&self, mode: ImageInsertMode) -> Result<String> {
        match mode {
            ImageInsertMode::SvgInline => {
                let svg = str::from_utf8(&self.bytes)
                    .with_context(|| format!("{} is not UTF-8 text", self.name))?;
                Ok(format!("<!-- Inline SVG inserted -->\n{}", svg.trim()))
            }
            ImageInsertMode::Base64 => Ok(format!(
                "<!-- Image inserted via helper -->\n<img src=\"{}\" alt=\"Embedded image\" />",
                self.data_uri()
            )),
        }
    }
}

/// Log line for a successful insert.
pub fn inserted_message(mode: ImageInsertMode) -> &'static str {
    match mode {
        ImageInsertMode::SvgInline => "Inserted inline SVG into XSLT.",
        ImageInsertMode::Base64 => "Inserted Base64 data URI image into XSLT.",
    }
}
