// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Image attachments
//!
//! Encodes image files as `data:` URLs and builds the multimodal prompt.
//! Whether the model accepts images is checked here, at the boundary, since
//! the conversation engine does not validate it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

use crate::error::{PolainError, Result};
use crate::llm::message::{ContentPart, MessageContent};
use crate::models::ModelDefinition;

/// Image formats the chat endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageMime {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

/// `data:<mime>;base64,<payload>`
pub fn image_data_url(mime: ImageMime, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime.mime_type(), STANDARD.encode(bytes))
}

/// Read an image file into a `data:` URL
pub fn encode_image_file(path: &Path) -> Result<String> {
    let mime = ImageMime::from_path(path).ok_or_else(|| {
        PolainError::InvalidInput(format!(
            "unsupported image type: {} (expected jpg, png, gif or webp)",
            path.display()
        ))
    })?;
    let bytes = std::fs::read(path)?;
    Ok(image_data_url(mime, &bytes))
}

/// Build the prompt content for one turn.
///
/// Without images this is plain text. With images the model must support
/// vision, otherwise the call is rejected before anything is sent.
pub fn build_prompt(
    text: &str,
    images: &[impl AsRef<Path>],
    model: &ModelDefinition,
) -> Result<MessageContent> {
    if images.is_empty() {
        return Ok(MessageContent::Text(text.to_string()));
    }

    if !model.supports_vision() {
        let name = if model.is_unknown() {
            "the selected model"
        } else {
            model.name.as_str()
        };
        return Err(PolainError::InvalidInput(format!(
            "{} does not accept image attachments",
            name
        )));
    }

    let mut parts = vec![ContentPart::text(text)];
    for path in images {
        parts.push(ContentPart::image(encode_image_file(path.as_ref())?));
    }
    Ok(MessageContent::Parts(parts))
}
