//! Turns transfer events into notifications and delivers them with pacing.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use walletwatch_domain::model::{Destination, TransferEvent};

use crate::pacer::Pacer;

pub const NOTIFICATION_TITLE: &str = "🚨 New Solana Transaction";
pub const BRANDING: &str = "Powered by Solana Wallet Bot";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageField {
    pub name: String,
    pub value: String,
}

/// Destination-agnostic notification body.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub title: String,
    pub description: String,
    pub fields: Vec<MessageField>,
    pub color: u32,
    pub timestamp: DateTime<Utc>,
    pub footer: String,
}

impl NotificationMessage {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

pub fn format_transfer(event: &TransferEvent, explorer_base_url: &str) -> NotificationMessage {
    let explorer = explorer_base_url.trim_end_matches('/');
    NotificationMessage {
        title: NOTIFICATION_TITLE.to_string(),
        description: format!("[View on Solscan]({explorer}/tx/{})", event.signature),
        fields: vec![
            MessageField {
                name: "Wallet".to_string(),
                value: event.address.to_string(),
            },
            MessageField {
                name: "Amount (SOL)".to_string(),
                value: format!("{:.4}", event.amount_sol()),
            },
            MessageField {
                name: "Type".to_string(),
                value: event.direction.label().to_string(),
            },
        ],
        color: event.direction.color(),
        timestamp: event.timestamp,
        footer: BRANDING.to_string(),
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("destination rate limited the message")]
    RateLimited,
    #[error("destination rejected the message with status {0}")]
    Rejected(u16),
    #[error("delivery failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        destination: &Destination,
        message: &NotificationMessage,
    ) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    embeds: [WebhookEmbed<'a>; 1],
}

#[derive(Serialize)]
struct WebhookEmbed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    fields: &'a [MessageField],
    timestamp: String,
    footer: WebhookFooter<'a>,
}

#[derive(Serialize)]
struct WebhookFooter<'a> {
    text: &'a str,
}

/// Posts notifications as chat embeds to a webhook URL.
pub struct WebhookNotifier {
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        destination: &Destination,
        message: &NotificationMessage,
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            embeds: [WebhookEmbed {
                title: &message.title,
                description: &message.description,
                color: message.color,
                fields: &message.fields,
                timestamp: message.timestamp.to_rfc3339(),
                footer: WebhookFooter {
                    text: &message.footer,
                },
            }],
        };

        let response = self
            .http
            .post(destination.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(NotifyError::RateLimited);
        }
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The tenant has no destination configured.
    Dropped,
    Failed,
}

/// Formats and sends transfer events, pausing after every successful send so
/// consecutive messages for one target stay under the destination's limits.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    pacer: Arc<dyn Pacer>,
    pacing: Duration,
    explorer_base_url: String,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        pacer: Arc<dyn Pacer>,
        pacing: Duration,
        explorer_base_url: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            pacer,
            pacing,
            explorer_base_url: explorer_base_url.into(),
        }
    }

    pub async fn dispatch(
        &self,
        destination: Option<&Destination>,
        event: &TransferEvent,
    ) -> Delivery {
        let Some(destination) = destination else {
            debug!(tenant = %event.tenant, signature = %event.signature, "no destination, dropping notification");
            counter!("watch_notifications_total", "result" => "dropped").increment(1);
            return Delivery::Dropped;
        };

        let message = format_transfer(event, &self.explorer_base_url);
        match self.notifier.send(destination, &message).await {
            Ok(()) => {
                counter!("watch_notifications_total", "result" => "sent").increment(1);
                self.pacer.pause(self.pacing).await;
                Delivery::Sent
            }
            Err(err) => {
                counter!("watch_notifications_total", "result" => "failed").increment(1);
                warn!(
                    tenant = %event.tenant,
                    signature = %event.signature,
                    ?err,
                    "failed to deliver notification"
                );
                Delivery::Failed
            }
        }
    }
}
