//! `text/event-stream` client used by the event channel.
//!
//! [`EventStreamParser`] turns raw bytes into frames; [`EventSource`] owns the
//! HTTP connection and reconnects after a fixed delay when the stream ends or
//! fails.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type; `message` when the stream did not name one.
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream when this event was dispatched.
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Event(Event),
    Comment(String),
}

/// Incremental parser for the event-stream wire format.
///
/// Accepts `\n`, `\r\n` and `\r` line endings, including ones split across
/// chunks.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    line: Vec<u8>,
    skip_lf: bool,
    event_type: String,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut frames),
                b'\r' => {
                    self.end_line(&mut frames);
                    self.skip_lf = true;
                }
                _ => self.line.push(byte),
            }
        }
        frames
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnect delay requested by the server, if one arrived since the last call.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// Drop any half-received event, keeping the last event id.
    pub fn reset(&mut self) {
        self.line.clear();
        self.skip_lf = false;
        self.event_type.clear();
        self.data.clear();
        self.has_data = false;
    }

    fn end_line(&mut self, frames: &mut Vec<Frame>) {
        let line = std::mem::take(&mut self.line);
        self.process_line(&String::from_utf8_lossy(&line), frames);
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<Frame>) {
        if line.is_empty() {
            self.dispatch(frames);
            return;
        }
        if let Some(comment) = line.strip_prefix(':') {
            frames.push(Frame::Comment(
                comment.strip_prefix(' ').unwrap_or(comment).to_string(),
            ));
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => trace!(field, "ignoring unknown event-stream field"),
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<Frame>) {
        let event_type = std::mem::take(&mut self.event_type);
        if !self.has_data {
            return;
        }
        self.has_data = false;
        frames.push(Frame::Event(Event {
            event: if event_type.is_empty() {
                "message".to_string()
            } else {
                event_type
            },
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        }));
    }
}

/// What an [`EventSource`] reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourceEvent {
    Open,
    Event(Event),
    Comment(String),
    Error(String),
    Closed,
}

enum State {
    Connect { delay: Option<Duration> },
    Streaming(BoxStream<'static, reqwest::Result<Vec<u8>>>),
    Stopped,
}

/// A reconnecting event-stream subscription.
pub(crate) struct EventSource {
    http: reqwest::Client,
    url: String,
    token: String,
    reconnect_interval: Duration,
    parser: EventStreamParser,
    pending: VecDeque<SourceEvent>,
    state: State,
}

impl EventSource {
    pub(crate) fn new(
        http: reqwest::Client,
        url: String,
        token: &str,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            http,
            url,
            token: token.to_string(),
            reconnect_interval,
            parser: EventStreamParser::new(),
            pending: VecDeque::new(),
            state: State::Connect { delay: None },
        }
    }

    /// Next lifecycle event or frame; `None` once the server has told us to
    /// stop (HTTP 204).
    pub(crate) async fn next(&mut self) -> Option<SourceEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            match &mut self.state {
                State::Stopped => return None,
                State::Connect { delay } => {
                    if let Some(delay) = delay.take() {
                        tokio::time::sleep(delay).await;
                    }
                    self.connect().await;
                }
                State::Streaming(stream) => match stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in self.parser.feed(&chunk) {
                            self.pending.push_back(match frame {
                                Frame::Event(event) => SourceEvent::Event(event),
                                Frame::Comment(comment) => SourceEvent::Comment(comment),
                            });
                        }
                        if let Some(retry) = self.parser.take_retry() {
                            debug!(?retry, "server changed reconnect interval");
                            self.reconnect_interval = retry;
                        }
                    }
                    Some(Err(err)) => {
                        self.pending.push_back(SourceEvent::Error(err.to_string()));
                        self.schedule_reconnect();
                    }
                    None => {
                        self.pending.push_back(SourceEvent::Closed);
                        self.schedule_reconnect();
                    }
                },
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.parser.reset();
        self.state = State::Connect {
            delay: Some(self.reconnect_interval),
        };
    }

    async fn connect(&mut self) {
        debug!(url = %self.url, "connecting event stream");
        let mut request = self
            .http
            .get(&self.url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .bearer_auth(&self.token);
        if let Some(id) = self.parser.last_event_id() {
            request = request.header("Last-Event-ID", id);
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => {
                debug!("event stream ended by server");
                self.pending.push_back(SourceEvent::Closed);
                self.state = State::Stopped;
            }
            Ok(response) if response.status().is_success() => {
                let stream = response
                    .bytes_stream()
                    .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                    .boxed();
                self.state = State::Streaming(stream);
                self.pending.push_back(SourceEvent::Open);
            }
            Ok(response) => {
                self.pending.push_back(SourceEvent::Error(format!(
                    "event stream returned status {}",
                    response.status()
                )));
                self.schedule_reconnect();
            }
            Err(err) => {
                self.pending.push_back(SourceEvent::Error(err.to_string()));
                self.schedule_reconnect();
            }
        }
    }
}
