//! Task progress over server-sent events.

use std::collections::VecDeque;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use console_core::TaskStatus;
use console_logging::console_debug;

use crate::api::ConsoleApi;
use crate::transport::ByteStream;
use crate::ApiError;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence or a
/// line ending; only complete lines are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// JSON payloads of a task's progress stream.
pub struct TaskStream {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Value>,
}

impl TaskStream {
    /// Opens `/v1/video/tasks/{id}/stream`.
    pub async fn open(api: &ConsoleApi, task_id: &str) -> Result<Self, ApiError> {
        let request = api.video_stream_request(task_id);
        let body = api.client().open_stream(&request).await?;
        Ok(Self::from_body(body))
    }

    pub fn from_body(body: ByteStream) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// The next `message` payload, or `None` once the server closed the
    /// stream. Frames that are not JSON are skipped.
    pub async fn next_update(&mut self) -> Option<Result<Value, ApiError>> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return Some(Ok(value));
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    for event in self.decoder.feed(&chunk) {
                        if event.event != "message" {
                            continue;
                        }
                        match serde_json::from_str::<Value>(&event.data) {
                            Ok(value) => self.pending.push_back(value),
                            Err(err) => console_debug!("Skipping unparsable frame: {}", err),
                        }
                    }
                }
                Some(Err(err)) => return Some(Err(err)),
                None => return None,
            }
        }
    }
}

/// Typed view of a progress payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamUpdate {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, alias = "taskId", alias = "id")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StreamUpdate {
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// The server closes the stream after one of these.
    pub fn is_final(&self) -> bool {
        matches!(self.event_type.as_str(), "completed" | "failed" | "cancelled")
    }
}
