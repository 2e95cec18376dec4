//! MQTT client adapter (spec.md §4.11, C11): owns the broker connection and
//! turns inbound `PUBLISH` packets into [`Message`]s on a bounded channel for
//! the dispatch loop to drain.

use foundations::telemetry::log;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use std::time::Duration;
use tokio::sync::mpsc;

/// Bound on the inbound-message channel; the dispatch loop reads faster than
/// a single broker connection can push, so this only guards against a slow
/// consumer stalling `EventLoop::poll`.
const CHANNEL_CAPACITY: usize = 1024;

/// Fixed backoff between reconnect attempts after a poll error (spec.md
/// §4.11: "reconnection uses a fixed delay, not exponential backoff").
const RECONNECT_BACKOFF: Duration = Duration::from_secs(15);

const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// One decoded `PUBLISH`, handed to [`crate::dispatch::Dispatcher::dispatch`].
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub timestamp_ms: i64,
}

/// Connects to `host:port`, subscribes to `subscriptions`, and spawns the
/// background poll loop. Returns the client handle (kept alive so the
/// connection isn't dropped) and the receiving end of the message channel.
pub fn spawn(host: String, port: u16, subscriptions: Vec<String>) -> (AsyncClient, mpsc::Receiver<Message>) {
    let mut opts = MqttOptions::new("mqtt-bridge", host, port);
    opts.set_keep_alive(KEEP_ALIVE);

    let (client, event_loop) = AsyncClient::new(opts, CHANNEL_CAPACITY);
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(subscribe_on_connect(client.clone(), subscriptions));
    tokio::spawn(poll_loop(event_loop, tx));

    (client, rx)
}

/// `AsyncClient::subscribe_many` only has an effect once the connection is
/// up; rumqttc queues it internally until then, so firing it immediately
/// after construction is sufficient (it's also replayed on every
/// reconnect by rumqttc itself).
async fn subscribe_on_connect(client: AsyncClient, subscriptions: Vec<String>) {
    if subscriptions.is_empty() {
        return;
    }

    let filters = subscriptions
        .into_iter()
        .map(|path| rumqttc::v5::mqttbytes::v5::Filter::new(path, QoS::AtMostOnce));

    if let Err(e) = client.subscribe_many(filters).await {
        log::warn!("initial MQTT subscription failed"; "error" => e.to_string());
    }
}

async fn poll_loop(mut event_loop: EventLoop, tx: mpsc::Sender<Message>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Ok(topic) = String::from_utf8(publish.topic.to_vec()) else {
                    log::debug!("MQTT publish topic was not valid UTF-8, message dropped");
                    continue;
                };
                let Ok(payload) = String::from_utf8(publish.payload.to_vec()) else {
                    log::debug!("MQTT publish payload was not valid UTF-8, message dropped"; "topic" => topic);
                    continue;
                };

                let timestamp_ms = current_millis();

                if tx.send(Message { topic, payload, timestamp_ms }).await.is_err() {
                    // Receiver dropped: the dispatch loop is shutting down.
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("MQTT connection error, reconnecting"; "error" => e.to_string(), "backoff_secs" => RECONNECT_BACKOFF.as_secs());
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}

fn current_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
