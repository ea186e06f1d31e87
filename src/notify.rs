use std::time::Duration;

use actix_web_lab::sse;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::MediaSlot;

const HUB_CAPACITY: usize = 64;

/// One "something changed, re-fetch" signal. Deliberately carries no diff:
/// delivery is at-least-once with no ordering contract, so consumers must
/// re-read full slot state rather than apply deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum ChangeEvent {
    Media { slot: MediaSlot },
    Donations,
}

/// In-process broadcast hub behind the SSE endpoints. Publishing with no
/// subscribers is fine; a lagging subscriber just misses duplicate signals.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        ChangeHub { tx }
    }

    pub fn publish_media(&self, slot: MediaSlot) {
        let _ = self.tx.send(ChangeEvent::Media { slot });
    }

    pub fn publish_donations(&self) {
        let _ = self.tx.send(ChangeEvent::Donations);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards matching hub events to one SSE client as "change" events. The
/// liveness tick probes the sender between events so a forwarder whose
/// client has disconnected is reclaimed within one interval instead of
/// parking on `recv` until the next mutation.
pub async fn forward_events<F>(
    mut rx: broadcast::Receiver<ChangeEvent>,
    tx: sse::Sender,
    liveness_interval: Duration,
    filter: F,
) where
    F: Fn(&ChangeEvent) -> bool,
{
    let mut liveness = tokio::time::interval(liveness_interval);
    loop {
        tokio::select! {
            _ = liveness.tick() => {
                if tx.send(sse::Event::Comment("keep-alive".into())).await.is_err() {
                    break;
                }
            }
            event = rx.recv() => match event {
                Ok(event) if filter(&event) => {
                    let data = match sse::Data::new_json(&event) {
                        Ok(data) => data,
                        Err(_) => continue,
                    };
                    if tx.send(data.event("change")).await.is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
