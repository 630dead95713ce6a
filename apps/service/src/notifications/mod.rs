/// Down/recovery alerting
///
/// `NotificationDispatcher` renders the fixed message templates, hands them to
/// a `NotificationTransport` and records every attempt in the audit log.
pub mod dispatcher;
pub mod senders;

pub use dispatcher::NotificationDispatcher;
pub use senders::{LogTransport, NotificationTransport, TransportError, WebhookTransport};
