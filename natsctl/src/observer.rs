//! Observer Streams.
//!
//! Per-subscriber fan-out over stream listings on a JetStream-enabled
//! account: one producer task per requested source, merged by stream name,
//! rendered as an SSE event. Grounded on
//! `interfaces/web/handler/streams.go` and `sse.go`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};
use crate::fanout;

/// One of the two valid `sources` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    StreamList,
    StreamCount,
}

impl Source {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "stream_list" => Ok(Source::StreamList),
            "stream_count" => Ok(Source::StreamCount),
            other => Err(Error::Validation(format!("unknown source: {other}"))),
        }
    }
}

#[derive(Debug, Default)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub retry: Option<u64>,
    pub data: String,
}

/// Frames one event the way `SSEHandler`'s write loop does: `id:`, `event:`,
/// `retry:`, then `data:`, each field its own line, terminated by a blank
/// line.
pub fn frame_sse_event(ev: &SseEvent) -> String {
    let mut out = String::new();
    if let Some(id) = &ev.id {
        out.push_str(&format!("id: {id}\n"));
    }
    if let Some(event) = &ev.event {
        out.push_str(&format!("event: {event}\n"));
    }
    if let Some(retry) = ev.retry {
        out.push_str(&format!("retry: {retry}\n"));
    }
    out.push_str(&format!("data: {}\n\n", ev.data));
    out
}

#[derive(Debug, Deserialize)]
struct AccountDetailResponse {
    #[serde(default)]
    data: Option<AccountDetailData>,
    #[serde(default)]
    error: Option<AccountDetailError>,
    /// The cluster's current server count, carried on every JSZ reply
    /// (successful or errored) so callers can tell when every node has
    /// answered.
    #[serde(default, rename = "active_servers")]
    active_servers: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AccountDetailData {
    #[serde(default)]
    streams: Vec<StreamDetail>,
}

#[derive(Debug, Deserialize)]
struct AccountDetailError {
    description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDetail {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn is_benign_cluster_error(description: &str) -> bool {
    description.contains("not jetstream enabled") || description.contains("not found")
}

/// Accumulates distinct streams across replies, first occurrence wins.
#[derive(Default)]
struct StreamSnapshot {
    streams: Vec<StreamDetail>,
}

impl StreamSnapshot {
    fn merge(&mut self, incoming: Vec<StreamDetail>) {
        for stream in incoming {
            if !self.streams.iter().any(|existing| existing.name == stream.name) {
                self.streams.push(stream);
            }
        }
    }
}

fn render_stream_list(streams: &[StreamDetail]) -> String {
    let mut out = String::from("<ul>");
    for stream in streams {
        out.push_str(&format!("<li>{}</li>", stream.name));
    }
    out.push_str("</ul>");
    out
}

/// Spawns a producer task for `source` against `account_public_key`,
/// pushing `SseEvent`s onto `tx` until the receiver is dropped (the
/// equivalent of the request context ending), a non-benign cluster error
/// arrives, or every active server has replied.
pub fn spawn_producer(
    client: async_nats::Client,
    account_public_key: String,
    source: Source,
    tx: mpsc::UnboundedSender<Result<SseEvent>>,
) {
    tokio::spawn(async move {
        let subject = format!("$SYS.REQ.ACCOUNT.{account_public_key}.JSZ");
        let payload = bytes::Bytes::from_static(br#"{"streams":true}"#);

        let cancel = CancellationToken::new();
        let mut rx = fanout::request_multiple_channel(client, subject, payload, cancel.clone(), |_| true);
        let mut snapshot = StreamSnapshot::default();
        let mut reply_count: i64 = 0;
        let mut active_servers: Option<i64> = None;

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    let parsed: AccountDetailResponse = match serde_json::from_slice(&msg.payload) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            warn!(error = %e, "observer: malformed cluster response");
                            break;
                        }
                    };

                    reply_count += 1;
                    if let Some(n) = parsed.active_servers {
                        active_servers = Some(n);
                    }
                    let all_servers_reported = active_servers.is_some_and(|n| reply_count >= n);

                    if let Some(err) = &parsed.error {
                        if is_benign_cluster_error(&err.description) {
                            if all_servers_reported {
                                break;
                            }
                            continue;
                        }
                        warn!(error = %err.description, "observer: non-benign cluster error");
                        let _ = tx.send(Err(Error::ClusterResponse(err.description.clone())));
                        break;
                    }

                    let Some(data) = parsed.data else {
                        if all_servers_reported {
                            break;
                        }
                        continue;
                    };

                    snapshot.merge(data.streams);

                    let event = match source {
                        Source::StreamList => SseEvent {
                            id: None,
                            event: Some("stream_list".into()),
                            retry: None,
                            data: render_stream_list(&snapshot.streams),
                        },
                        Source::StreamCount => SseEvent {
                            id: None,
                            event: Some("stream_count".into()),
                            retry: None,
                            data: format!("<span>{}</span>", snapshot.streams.len()),
                        },
                    };
                    if tx.send(Ok(event)).is_err() {
                        break;
                    }
                    if all_servers_reported {
                        break;
                    }
                }
            }
        }
        cancel.cancel();
    });
}

/// Default per-event keepalive retry hint, matching SSE clients' own
/// reconnect backoff expectations.
pub const DEFAULT_RETRY: Duration = Duration::from_secs(3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_full_event() {
        let ev = SseEvent {
            id: Some("1".into()),
            event: Some("stream_count".into()),
            retry: Some(3000),
            data: "<span>2</span>".into(),
        };
        let framed = frame_sse_event(&ev);
        assert_eq!(framed, "id: 1\nevent: stream_count\nretry: 3000\ndata: <span>2</span>\n\n");
    }

    #[test]
    fn frames_data_only_event() {
        let ev = SseEvent {
            id: None,
            event: None,
            retry: None,
            data: "hello".into(),
        };
        assert_eq!(frame_sse_event(&ev), "data: hello\n\n");
    }

    #[test]
    fn benign_errors_are_recognized() {
        assert!(is_benign_cluster_error("stream not found"));
        assert!(is_benign_cluster_error("jetstream not jetstream enabled for account"));
        assert!(!is_benign_cluster_error("permission denied"));
    }

    #[test]
    fn snapshot_merge_dedups_by_name() {
        let mut snapshot = StreamSnapshot::default();
        snapshot.merge(vec![StreamDetail {
            name: "orders".into(),
            extra: Default::default(),
        }]);
        snapshot.merge(vec![
            StreamDetail {
                name: "orders".into(),
                extra: Default::default(),
            },
            StreamDetail {
                name: "events".into(),
                extra: Default::default(),
            },
        ]);
        assert_eq!(snapshot.streams.len(), 2);
    }

    #[test]
    fn source_parse_rejects_unknown() {
        assert!(Source::parse("bogus").is_err());
        assert_eq!(Source::parse("stream_list").unwrap(), Source::StreamList);
    }

    #[test]
    fn active_servers_is_decoded_from_replies() {
        let raw = br#"{"data":{"streams":[]},"active_servers":3}"#;
        let parsed: AccountDetailResponse = serde_json::from_slice(raw).unwrap();
        assert_eq!(parsed.active_servers, Some(3));
    }

    #[test]
    fn non_benign_error_is_not_filtered() {
        let raw = br#"{"error":{"description":"permission denied"},"active_servers":3}"#;
        let parsed: AccountDetailResponse = serde_json::from_slice(raw).unwrap();
        let err = parsed.error.unwrap();
        assert!(!is_benign_cluster_error(&err.description));
    }
}
