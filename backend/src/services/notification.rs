//! Order event notifications
//!
//! Events are written to an outbox table and, when a webhook is configured,
//! pushed to it immediately. Delivery is best-effort: failures are recorded
//! on the outbox row and logged, never returned to the caller.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::config::NotificationConfig;
use shared::EntityType;

/// Notification service for order events
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    webhook: Option<WebhookClient>,
}

/// HTTP client for the order event webhook
#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    http_client: reqwest::Client,
}

/// Order events emitted by the engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderConfirmed {
        sales_order_id: Uuid,
        opportunity_id: Uuid,
        client_id: Uuid,
        client_name: String,
        product_name: String,
        total_amount: Option<Decimal>,
        confirmed_by: Uuid,
        confirmed_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderConfirmed { .. } => "order_confirmed",
        }
    }

    fn entity(&self) -> (EntityType, Uuid) {
        match self {
            OrderEvent::OrderConfirmed { sales_order_id, .. } => {
                (EntityType::SalesOrder, *sales_order_id)
            }
        }
    }
}

impl WebhookClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http_client })
    }

    /// Post an event to the webhook
    pub async fn post(&self, event: &OrderEvent) -> Result<(), String> {
        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(event)
            .send()
            .await
            .map_err(|e| format!("Failed to deliver webhook: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Webhook responded with {}", response.status()))
        }
    }
}

impl NotificationService {
    pub fn new(db: PgPool, config: &NotificationConfig) -> Self {
        let webhook = config.webhook_url.clone().and_then(|url| {
            WebhookClient::new(url, Duration::from_secs(config.timeout_secs))
                .map_err(|e| tracing::warn!("Webhook client unavailable: {}", e))
                .ok()
        });
        Self { db, webhook }
    }

    /// Record and deliver an event. Never fails the caller.
    pub async fn notify(&self, event: OrderEvent) {
        let outbox_id = match self.enqueue(&event).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(event = event.event_type(), "Failed to queue notification: {}", e);
                return;
            }
        };

        let Some(webhook) = &self.webhook else {
            tracing::info!(event = event.event_type(), "Notification queued without webhook");
            return;
        };

        let outcome = webhook.post(&event).await;
        if let Err(e) = &outcome {
            tracing::warn!(event = event.event_type(), "Notification delivery failed: {}", e);
        }
        if let Err(e) = self.mark_outcome(outbox_id, outcome.err()).await {
            tracing::warn!(%outbox_id, "Failed to update notification outbox: {}", e);
        }
    }

    async fn enqueue(&self, event: &OrderEvent) -> Result<Uuid, sqlx::Error> {
        let (entity_type, entity_id) = event.entity();
        let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);

        let (id,) = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO notification_outbox (event_type, entity_type, entity_id, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(event.event_type())
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(payload)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn mark_outcome(&self, id: Uuid, error: Option<String>) -> Result<(), sqlx::Error> {
        let status = if error.is_some() { "FAILED" } else { "SENT" };
        sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = $2,
                error_message = $3,
                sent_at = CASE WHEN $2 = 'SENT' THEN NOW() ELSE sent_at END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_confirmed_payload_shape() {
        let event = OrderEvent::OrderConfirmed {
            sales_order_id: Uuid::new_v4(),
            opportunity_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            client_name: "Acme Foods".to_string(),
            product_name: "Turmeric powder".to_string(),
            total_amount: Some(Decimal::from(250000)),
            confirmed_by: Uuid::new_v4(),
            confirmed_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "order_confirmed");
        assert_eq!(json["client_name"], "Acme Foods");
        assert_eq!(event.event_type(), "order_confirmed");
    }
}
