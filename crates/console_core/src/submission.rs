//! Generation request building and client-side validation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};

use crate::TaskType;

/// Largest reference image accepted for upload.
pub const MAX_REFERENCE_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_VIDEO_MODEL: &str = "grok-imagine-1.0-video";
pub const DEFAULT_IMAGE_MODEL: &str = "grok-imagine-1.0";

const VIDEO_FALLBACK_TEXT: &str = "video generation";
const IMAGE_TO_VIDEO_TEXT: &str = "Generate video from this image";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a reference image is required in image mode")]
    MissingReferenceImage,
    #[error("reference image is {actual} bytes, limit is {max} bytes")]
    ReferenceImageTooLarge { max: usize, actual: usize },
    #[error("image input is not supported for image tasks")]
    UnsupportedImageInput,
}

/// Whether the generation is driven by text alone or by a reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Text,
    Image,
}

/// A reference image carried inline as a data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    data_url: String,
    byte_len: usize,
}

impl ReferenceImage {
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Result<Self, ValidationError> {
        if bytes.len() > MAX_REFERENCE_IMAGE_BYTES {
            return Err(ValidationError::ReferenceImageTooLarge {
                max: MAX_REFERENCE_IMAGE_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            data_url: format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
            byte_len: bytes.len(),
        })
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

/// Guess an image MIME type from a file name, defaulting to PNG.
pub fn mime_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub task_type: TaskType,
    pub mode: InputMode,
    pub model: String,
    pub prompt: String,
    /// Instruction text sent alongside a reference image.
    pub image_prompt: String,
    pub reference_image: Option<ReferenceImage>,
    pub aspect_ratio: String,
    pub resolution: String,
    pub duration_secs: u32,
    pub preset: String,
}

impl GenerationRequest {
    pub fn video(prompt: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::Video,
            model: DEFAULT_VIDEO_MODEL.to_string(),
            prompt: prompt.into(),
            ..Self::defaults()
        }
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::Image,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            prompt: prompt.into(),
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        Self {
            task_type: TaskType::Video,
            mode: InputMode::Text,
            model: DEFAULT_VIDEO_MODEL.to_string(),
            prompt: String::new(),
            image_prompt: String::new(),
            reference_image: None,
            aspect_ratio: "3:2".to_string(),
            resolution: "720p".to_string(),
            duration_secs: 6,
            preset: "normal".to_string(),
        }
    }

    /// Switches to image-driven generation with the given reference.
    pub fn with_reference_image(mut self, image: ReferenceImage, instruction: &str) -> Self {
        self.mode = InputMode::Image;
        self.reference_image = Some(image);
        self.image_prompt = instruction.to_string();
        self
    }

    /// Rejects requests that must never reach the backend.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.mode {
            InputMode::Text => {
                if self.prompt.trim().is_empty() {
                    return Err(ValidationError::EmptyPrompt);
                }
            }
            InputMode::Image => {
                if self.task_type == TaskType::Image {
                    return Err(ValidationError::UnsupportedImageInput);
                }
                let image = self
                    .reference_image
                    .as_ref()
                    .ok_or(ValidationError::MissingReferenceImage)?;
                if image.byte_len > MAX_REFERENCE_IMAGE_BYTES {
                    return Err(ValidationError::ReferenceImageTooLarge {
                        max: MAX_REFERENCE_IMAGE_BYTES,
                        actual: image.byte_len,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn endpoint(&self) -> &'static str {
        match self.task_type {
            TaskType::Video => "/v1/video/generations/async",
            TaskType::Image => "/v1/images/generations/async",
        }
    }

    pub fn to_payload(&self) -> Value {
        match self.task_type {
            TaskType::Video => self.video_payload(),
            TaskType::Image => self.image_payload(),
        }
    }

    fn video_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("model".into(), json!(self.model));
        payload.insert(
            "video_config".into(),
            json!({
                "aspect_ratio": self.aspect_ratio,
                "video_length": self.duration_secs,
                "resolution_name": self.resolution,
                "preset": self.preset,
            }),
        );

        match (&self.mode, &self.reference_image) {
            (InputMode::Image, Some(image)) => {
                let text = if self.image_prompt.trim().is_empty() {
                    IMAGE_TO_VIDEO_TEXT
                } else {
                    self.image_prompt.as_str()
                };
                payload.insert(
                    "messages".into(),
                    json!([{
                        "role": "user",
                        "content": [
                            {"type": "image_url", "image_url": {"url": image.data_url()}},
                            {"type": "text", "text": text},
                        ],
                    }]),
                );
            }
            _ => {
                let content = if self.prompt.is_empty() {
                    VIDEO_FALLBACK_TEXT
                } else {
                    self.prompt.as_str()
                };
                payload.insert(
                    "messages".into(),
                    json!([{"role": "user", "content": content}]),
                );
                payload.insert("prompt".into(), json!(self.prompt));
            }
        }
        Value::Object(payload)
    }

    fn image_payload(&self) -> Value {
        json!({
            "model": self.model,
            "prompt": self.prompt,
            "size": size_for_ratio(&self.aspect_ratio),
            "n": 1,
            "response_format": "url",
        })
    }
}

/// Image sizes the image endpoint accepts, keyed by aspect ratio.
pub fn size_for_ratio(ratio: &str) -> &'static str {
    match ratio {
        "16:9" => "1280x720",
        "9:16" => "720x1280",
        "1:1" => "1024x1024",
        "3:2" | "4:3" => "1792x1024",
        "2:3" | "3:4" => "1024x1792",
        _ => "1024x1024",
    }
}
