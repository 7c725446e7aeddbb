use crate::types::{DocumentSnapshot, DocumentStore, RangeQuery, SnapshotStream, StoreError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use url::Url;

const USER_AGENT: &str = "news-feed/0.1";

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser. Feed it raw chunks, get complete events back.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(end) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end.0).collect();
            self.buffer.drain(..end.1);
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame)) {
                events.push(event);
            }
        }
        events
    }
}

/// Position of the first blank line: (frame length, separator length).
fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data: Vec<&str> = Vec::new();

    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() && event == "message" {
        return None;
    }
    Some(SseEvent { event, data: data.join("\n") })
}

/// Rank of a value in the store's ordering: missing/null, booleans, numbers, strings, objects.
fn order_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_children(a: &DocumentSnapshot, b: &DocumentSnapshot, child: &str) -> Ordering {
    let left = a.value.get(child);
    let right = b.value.get(child);
    let by_value = order_rank(left).cmp(&order_rank(right)).then_with(|| match (left, right) {
        (Some(Value::Bool(l)), Some(Value::Bool(r))) => l.cmp(r),
        (Some(Value::Number(l)), Some(Value::Number(r))) => {
            let l = l.as_f64().unwrap_or(0.0);
            let r = r.as_f64().unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(l)), Some(Value::String(r))) => l.cmp(r),
        _ => Ordering::Equal,
    });
    by_value.then_with(|| a.key.cmp(&b.key))
}

/// REST answers range queries with an unordered object; restore ascending order by `child`.
pub fn order_children(value: Value, child: &str) -> Vec<DocumentSnapshot> {
    let children: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => return Vec::new(),
    };
    let mut snapshots: Vec<DocumentSnapshot> = children
        .into_iter()
        .map(|(key, value)| DocumentSnapshot { key, value })
        .collect();
    snapshots.sort_by(|a, b| compare_children(a, b, child));
    snapshots
}

/// Client for a realtime-database REST endpoint (`<base>/<path>.json`).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Url,
    auth: Option<String>,
}

impl RestStore {
    pub fn new(base_url: Url, auth: Option<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("Configured REST article store at {}", base_url);
        Ok(Self { client, base_url, auth })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };

        // Keys may contain `?`, `#` or `%`; pushing segments percent-encodes them.
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidPath(format!("{}: base url cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(parents)
            .push(&format!("{}.json", last));
        if let Some(auth) = &self.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }

    fn query_endpoint(&self, path: &str, query: &RangeQuery) -> Result<Url, StoreError> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("orderBy", &format!("\"{}\"", query.order_by_child))
            .append_pair("limitToLast", &query.limit_to_last.to_string());
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        let detail = format!("HTTP {}: {}", status, detail.trim());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(detail),
            s if s.is_server_error() => StoreError::Unavailable(detail),
            _ => StoreError::Backend(detail),
        })
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::check(response).await
    }

    async fn read_json(response: Response) -> Result<Value, StoreError> {
        response.json::<Value>().await.map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let url = self.endpoint(path)?;
        let response = Self::send(self.client.post(url).json(&value)).await?;
        let pushed: PushResponse = response.json().await.map_err(|e| StoreError::Malformed(e.to_string()))?;
        debug!("Pushed {}/{}", path, pushed.name);
        Ok(pushed.name)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let url = self.endpoint(path)?;
        let value = Self::read_json(Self::send(self.client.get(url)).await?).await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn query_last(&self, path: &str, query: &RangeQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let url = self.query_endpoint(path, query)?;
        let value = Self::read_json(Self::send(self.client.get(url)).await?).await?;
        Ok(order_children(value, &query.order_by_child))
    }

    async fn watch(&self, path: &str, query: &RangeQuery) -> Result<SnapshotStream, StoreError> {
        let url = self.query_endpoint(path, query)?;
        let response = Self::send(self.client.get(url).header(ACCEPT, "text/event-stream")).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let store = self.clone();
        let path = path.to_string();
        let query = query.clone();

        tokio::spawn(async move {
            let mut body = Box::pin(response.bytes_stream());
            let mut decoder = SseDecoder::new();

            loop {
                let chunk = tokio::select! {
                    _ = sender.closed() => return,
                    chunk = body.next() => chunk,
                };
                let chunk = match chunk {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        let _ = sender.send(Err(StoreError::Unavailable(e.to_string())));
                        return;
                    }
                    None => {
                        let _ = sender.send(Err(StoreError::Unavailable("event stream closed".to_string())));
                        return;
                    }
                };

                for event in decoder.push(&chunk) {
                    match event.event.as_str() {
                        // The payload is a delta; re-read the query to get a full snapshot.
                        "put" | "patch" => {
                            let result = store.query_last(&path, &query).await;
                            let failed = result.is_err();
                            if sender.send(result).is_err() || failed {
                                return;
                            }
                        }
                        "keep-alive" => {}
                        "cancel" | "auth_revoked" => {
                            error!("Event stream for {} ended by server: {}", path, event.event);
                            let _ = sender.send(Err(StoreError::PermissionDenied(event.event.clone())));
                            return;
                        }
                        other => warn!("Ignoring unexpected event '{}' on {}", other, path),
                    }
                }
            }
        });

        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}
