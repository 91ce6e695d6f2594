//! Media extraction from heterogeneous task results.
//!
//! Generation backends report results in several shapes: direct link fields,
//! chat-completion envelopes whose message content embeds HTML or markdown,
//! bare content strings, and OpenAI-style image `data` arrays. Each result is
//! first classified into a [`ResultShape`] and then resolved by the resolver
//! for that shape. Nothing in here panics on malformed input; anything that
//! does not match degrades to `None`.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::{Map, Value};

use crate::TaskType;

static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="([^"]+)""#).expect("src pattern"));
static POSTER_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"poster="([^"]+)""#).expect("poster pattern"));
static MARKDOWN_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[video\]\(([^)]+)\)").expect("markdown pattern"));
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<)"]+"#).expect("url pattern"));

const SUMMARY_CHARS: usize = 30;

/// Displayable media for one task result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaRef {
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl MediaRef {
    pub fn is_empty(&self) -> bool {
        self.media_url.is_none()
    }
}

/// Known result payload shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape<'a> {
    /// `video_url` or `downloadUrl` present on the result object.
    DirectLink {
        media_url: &'a str,
        thumbnail_url: Option<&'a str>,
        content: Option<&'a str>,
    },
    /// `choices[0].message.content` of a chat completion.
    ChatCompletion {
        content: &'a str,
        thumbnail_url: Option<&'a str>,
    },
    /// Top-level `content` string.
    Content {
        content: &'a str,
        thumbnail_url: Option<&'a str>,
    },
    /// First entry of an image `data` array.
    ImageData { first: &'a Map<String, Value> },
    Unknown,
}

impl<'a> ResultShape<'a> {
    pub fn classify(task_type: TaskType, result: &'a Value) -> Self {
        let Some(object) = result.as_object() else {
            return ResultShape::Unknown;
        };
        match task_type {
            TaskType::Image => classify_image(object),
            TaskType::Video => classify_video(object),
        }
    }

    pub fn resolve(&self) -> MediaRef {
        match self {
            ResultShape::DirectLink {
                media_url,
                thumbnail_url,
                content,
            } => MediaRef {
                media_url: Some((*media_url).to_string()),
                thumbnail_url: thumbnail_url
                    .map(str::to_string)
                    .or_else(|| content.and_then(find_poster)),
            },
            ResultShape::ChatCompletion {
                content,
                thumbnail_url,
            }
            | ResultShape::Content {
                content,
                thumbnail_url,
            } => MediaRef {
                media_url: find_video_url(content),
                thumbnail_url: thumbnail_url
                    .map(str::to_string)
                    .or_else(|| find_poster(content)),
            },
            ResultShape::ImageData { first } => MediaRef {
                media_url: resolve_image(first),
                thumbnail_url: None,
            },
            ResultShape::Unknown => MediaRef::default(),
        }
    }
}

/// Extracts the displayable media URL and thumbnail from a task result.
pub fn extract_media(task_type: TaskType, result: Option<&Value>) -> MediaRef {
    match result {
        Some(result) => ResultShape::classify(task_type, result).resolve(),
        None => MediaRef::default(),
    }
}

fn classify_video(object: &Map<String, Value>) -> ResultShape<'_> {
    let thumbnail_url = non_empty_str(object.get("thumbnail_url"));
    let chat_content = object
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .map(|choice| {
            choice
                .pointer("/message/content")
                .and_then(Value::as_str)
                .unwrap_or("")
        });
    let content = chat_content.or_else(|| object.get("content").and_then(Value::as_str));

    // Direct fields win over anything embedded in content.
    let direct = non_empty_str(object.get("video_url"))
        .or_else(|| non_empty_str(object.get("downloadUrl")));
    if let Some(media_url) = direct {
        return ResultShape::DirectLink {
            media_url,
            thumbnail_url,
            content,
        };
    }

    match (chat_content, content) {
        (Some(content), _) if !content.is_empty() => ResultShape::ChatCompletion {
            content,
            thumbnail_url,
        },
        (None, Some(content)) if !content.is_empty() => ResultShape::Content {
            content,
            thumbnail_url,
        },
        _ => ResultShape::Unknown,
    }
}

fn classify_image(object: &Map<String, Value>) -> ResultShape<'_> {
    object
        .get("data")
        .and_then(Value::as_array)
        .and_then(|data| data.first())
        .and_then(Value::as_object)
        .map(|first| ResultShape::ImageData { first })
        .unwrap_or(ResultShape::Unknown)
}

fn resolve_image(first: &Map<String, Value>) -> Option<String> {
    if let Some(url) = non_empty_str(first.get("url")) {
        return Some(url.to_string());
    }
    let b64 = non_empty_str(first.get("b64_json"))?;
    STANDARD.decode(b64).ok()?;
    Some(format!("data:image/png;base64,{b64}"))
}

/// Searches generated content for the final video link.
///
/// Order: `<video>` tag `src`, then the last markdown `[video](url)`, then the
/// last bare http(s) URL. Responses may mention preview links before the
/// final one, so the last occurrence wins for the textual forms.
fn find_video_url(content: &str) -> Option<String> {
    if let Some(start) = content.find("<video") {
        if let Some(captures) = SRC_ATTR.captures(&content[start..]) {
            return Some(captures[1].to_string());
        }
    }
    if let Some(captures) = MARKDOWN_VIDEO.captures_iter(content).last() {
        return Some(captures[1].to_string());
    }
    BARE_URL
        .find_iter(content)
        .last()
        .map(|found| found.as_str().to_string())
}

fn find_poster(content: &str) -> Option<String> {
    POSTER_ATTR
        .captures(content)
        .map(|captures| captures[1].to_string())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// Decodes the bytes of a `data:<mime>;base64,<payload>` URL.
pub fn decode_inline_media(url: &str) -> Option<Vec<u8>> {
    let rest = url.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    STANDARD.decode(payload).ok()
}

/// One-line summary of a task's request payload for list rows.
pub fn payload_summary(payload: &Value) -> String {
    if payload.is_null() {
        return "-".to_string();
    }
    if let Some(prompt) = non_empty_str(payload.get("prompt")) {
        return truncate(prompt);
    }
    let last_message = payload
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.last());
    if let Some(message) = last_message {
        return match message.get("content") {
            Some(Value::String(content)) => truncate(content),
            _ => "[multimodal content]".to_string(),
        };
    }
    "see details".to_string()
}

fn truncate(text: &str) -> String {
    if text.chars().count() > SUMMARY_CHARS {
        let head: String = text.chars().take(SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
