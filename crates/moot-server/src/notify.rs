//! Notification delivery backends.
//!
//! Handlers emit events synchronously and move on; both gateways here return
//! immediately. [`LogNotifier`] turns every event into a log line and is the
//! default. [`WebhookNotifier`] forwards events as JSON to an external relay
//! (mail bridge, chat hook) on a spawned task.

use moot_core::notify::{Notification, NotificationGateway};
use serde_json::{Value, json};
use tracing::{info, warn};

// ─── Log gateway ─────────────────────────────────────────────────────────────

/// Writes each event to the log.
///
/// The verification token appears in the line on purpose: with no mail relay
/// configured, the log is how a deployer completes the flow.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationGateway for LogNotifier {
  fn notify(&self, notification: Notification) {
    match notification {
      Notification::Welcome { email, display_name } => {
        info!(%email, %display_name, "welcome notification");
      }
      Notification::VerifyEmail { email, token } => {
        info!(%email, %token, "email verification requested");
      }
      Notification::PostCreated { author_display_name, title, slug } => {
        info!(author = %author_display_name, %title, %slug, "post published");
      }
      Notification::NewAnswer {
        recipient_email,
        post_title,
        author_display_name,
      } => {
        info!(
          recipient = %recipient_email,
          post = %post_title,
          author = %author_display_name,
          "new answer notification"
        );
      }
    }
  }
}

// ─── Webhook gateway ─────────────────────────────────────────────────────────

/// Posts each event as JSON to a configured URL.
///
/// Delivery runs on a background task so the triggering request never waits
/// on the relay; failures are logged and dropped.
pub struct WebhookNotifier {
  url:  String,
  http: reqwest::Client,
}

impl WebhookNotifier {
  pub fn new(url: String) -> Self {
    Self { url, http: reqwest::Client::new() }
  }
}

impl NotificationGateway for WebhookNotifier {
  fn notify(&self, notification: Notification) {
    let url = self.url.clone();
    let http = self.http.clone();
    let body = payload(&notification);
    tokio::spawn(async move {
      match http.post(&url).json(&body).send().await {
        Ok(response) if !response.status().is_success() => {
          warn!(status = %response.status(), "webhook relay refused the event");
        }
        Err(err) => warn!(error = %err, "webhook delivery failed"),
        Ok(_) => {}
      }
    });
  }
}

/// Wire form of an event. The relay is the mail bridge, so the verification
/// token rides along in plaintext.
fn payload(notification: &Notification) -> Value {
  match notification {
    Notification::Welcome { email, display_name } => json!({
      "event":        "welcome",
      "email":        email,
      "display_name": display_name,
    }),
    Notification::VerifyEmail { email, token } => json!({
      "event": "verify_email",
      "email": email,
      "token": token,
    }),
    Notification::PostCreated { author_display_name, title, slug } => json!({
      "event":  "post_created",
      "author": author_display_name,
      "title":  title,
      "slug":   slug,
    }),
    Notification::NewAnswer {
      recipient_email,
      post_title,
      author_display_name,
    } => json!({
      "event":      "new_answer",
      "recipient":  recipient_email,
      "post_title": post_title,
      "author":     author_display_name,
    }),
  }
}
