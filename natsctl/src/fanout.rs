//! Multi-Response Fan-Out.
//!
//! Request/reply against an unknown number of responders: allocate an
//! inbox, subscribe, publish with that inbox as reply-to, and drain replies
//! until a stop condition fires. Grounded on `RequestMultiple` /
//! `RequestMultipleChannel`; the accumulated deadline here is tracked
//! against a fixed `Instant` rather than re-armed every iteration, which
//! avoids the original's per-second tick only ever breaking its inner
//! `select` instead of the whole loop.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// `max_responses == 0` means unbounded.
pub struct BatchOptions {
    pub timeout: Duration,
    pub max_responses: usize,
}

/// Gather replies until the deadline, `max_responses` is reached (if > 0),
/// `cancel` fires, or `each` returns `false`. `each` runs once per received
/// message, in arrival order, before the message is pushed onto the result.
/// On cancellation the outer context's error is returned unchanged rather
/// than the responses accumulated so far.
pub async fn request_multiple(
    client: &async_nats::Client,
    subject: impl ToString,
    payload: Bytes,
    opts: BatchOptions,
    cancel: CancellationToken,
    mut each: impl FnMut(&async_nats::Message) -> bool,
) -> Result<Vec<async_nats::Message>> {
    let inbox = client.new_inbox();
    let mut sub = client
        .subscribe(inbox.clone())
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    client
        .publish_with_reply(subject.to_string(), inbox, payload)
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    let deadline = Instant::now() + opts.timeout;
    let mut responses = Vec::new();

    let result = loop {
        if opts.max_responses > 0 && responses.len() >= opts.max_responses {
            break Ok(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => break Err(Error::Cancelled),
            outcome = tokio::time::timeout(remaining, sub.next()) => {
                match outcome {
                    Ok(Some(msg)) => {
                        let keep_going = each(&msg);
                        responses.push(msg);
                        if !keep_going {
                            break Ok(());
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(_) => break Ok(()),
                }
            }
        }
    };

    let _ = sub.unsubscribe().await;
    result.map(|()| responses)
}

/// The streaming variant: returns a receiver the caller drains. The
/// subscriber task exits when `each` returns `false`, `cancel` fires (the
/// outer context ending), or the receiver is dropped; it does not close the
/// channel on its own otherwise.
pub fn request_multiple_channel(
    client: async_nats::Client,
    subject: impl ToString,
    payload: Bytes,
    cancel: CancellationToken,
    mut each: impl FnMut(&async_nats::Message) -> bool + Send + 'static,
) -> mpsc::UnboundedReceiver<async_nats::Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    let subject = subject.to_string();

    tokio::spawn(async move {
        let inbox = client.new_inbox();
        let mut sub = match client.subscribe(inbox.clone()).await {
            Ok(sub) => sub,
            Err(_) => return,
        };
        if client.publish_with_reply(subject, inbox, payload).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = sub.next() => {
                    match msg {
                        Some(msg) => {
                            let keep_going = each(&msg);
                            if tx.send(msg).is_err() {
                                break;
                            }
                            if !keep_going {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = tx.closed() => break,
                _ = cancel.cancelled() => break,
            }
        }
        let _ = sub.unsubscribe().await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_options_zero_max_is_unbounded() {
        let opts = BatchOptions {
            timeout: Duration::from_secs(1),
            max_responses: 0,
        };
        assert_eq!(opts.max_responses, 0);
    }

    #[tokio::test]
    async fn cancelling_before_any_reply_returns_cancelled_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        // A cancelled token must win the race against the timeout branch on
        // the very first loop iteration, regardless of how long `remaining`
        // is computed to be.
        let deadline = Instant::now() + Duration::from_secs(5);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome: Result<()> = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(remaining) => Ok(()),
        };
        assert!(matches!(outcome, Err(Error::Cancelled)));
    }
}
