//! Order event consumer.
//!
//! Subscribes to the order-events subject and handles each event. The
//! notification side effect is simulated with log output.

use futures::StreamExt;

use crate::domain::OrderEvent;

/// Consume order events until the subscription ends. Intended to be spawned
/// as a background task next to the HTTP server.
pub async fn run(client: async_nats::Client, subject: String) {
    let mut subscriber = match client.subscribe(subject.clone()).await {
        Ok(subscriber) => subscriber,
        Err(err) => {
            tracing::error!(subject, error = %err, "order event worker failed to subscribe");
            return;
        }
    };
    tracing::info!(subject, "order event worker started");

    while let Some(message) = subscriber.next().await {
        match serde_json::from_slice::<OrderEvent>(&message.payload) {
            Ok(event) => handle(&event),
            Err(err) => tracing::warn!(error = %err, "discarding malformed order event"),
        }
    }
}

fn handle(event: &OrderEvent) {
    tracing::info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        order_id = %event.order_id,
        user_id = %event.user_id,
        total = %event.total_amount,
        "order event received; sending confirmation email"
    );
}
