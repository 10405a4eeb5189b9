//! Outbound notification gateway.
//!
//! The store and API layers emit [`Notification`]s at the moments users care
//! about; delivery (log line, webhook, mail relay) is the server's choice.

/// A user-facing event worth delivering out-of-band.
#[derive(Debug, Clone)]
pub enum Notification {
  /// Sent once, right after registration.
  Welcome {
    email:        String,
    display_name: String,
  },
  /// Carries the plaintext verification token, which is never stored.
  VerifyEmail {
    email: String,
    token: String,
  },
  /// A new post went live (digest/feed consumers).
  PostCreated {
    author_display_name: String,
    title:               String,
    slug:                String,
  },
  /// Someone answered the recipient's question.
  NewAnswer {
    recipient_email:     String,
    post_title:          String,
    author_display_name: String,
  },
}

/// Fire-and-forget delivery. Implementations must not block the caller;
/// failures are theirs to log and swallow.
pub trait NotificationGateway: Send + Sync {
  fn notify(&self, notification: Notification);
}
