use std::fmt;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::{Booking, User};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// To admins: a teacher asked for a slot.
    BookingRequested,
    /// To HODs: an admin approved and the booking awaits final approval.
    AwaitingHod,
    AdminApproved,
    AdminRejected,
    HodGranted,
    HodRejected,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::BookingRequested => "booking_requested",
            NoticeKind::AwaitingHod => "awaiting_hod",
            NoticeKind::AdminApproved => "admin_approved",
            NoticeKind::AdminRejected => "admin_rejected",
            NoticeKind::HodGranted => "hod_granted",
            NoticeKind::HodRejected => "hod_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl From<&User> for Recipient {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Rendered outbound message. Produced by the reconciler, consumed by a `Dispatcher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub to: Recipient,
    pub kind: NoticeKind,
    pub booking_id: Ulid,
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn render(kind: NoticeKind, to: Recipient, booking: &Booking) -> Self {
        let when = format!(
            "{} ({}) {}",
            booking.date,
            booking.weekday(),
            booking.time_slot()
        );
        let (subject, body) = match kind {
            NoticeKind::BookingRequested => (
                format!("New booking request for room {}", booking.room),
                format!(
                    "{} requested room {} on {} for \"{}\". Please review it.",
                    booking.teacher.name, booking.room, when, booking.purpose
                ),
            ),
            NoticeKind::AwaitingHod => (
                format!("Booking for room {} awaits your approval", booking.room),
                format!(
                    "The admin approved {}'s request for room {} on {}. Final approval is pending.",
                    booking.teacher.name, booking.room, when
                ),
            ),
            NoticeKind::AdminApproved => (
                "Booking approved by admin".to_string(),
                format!(
                    "Your booking for room {} on {} was approved by the admin and is awaiting HOD approval.",
                    booking.room, when
                ),
            ),
            NoticeKind::AdminRejected => (
                "Booking rejected".to_string(),
                format!(
                    "Your booking for room {} on {} was rejected by the admin.",
                    booking.room, when
                ),
            ),
            NoticeKind::HodGranted => (
                "Booking granted".to_string(),
                format!(
                    "Your booking for room {} on {} has been granted. The slot is confirmed.",
                    booking.room, when
                ),
            ),
            NoticeKind::HodRejected => (
                "Booking rejected by HOD".to_string(),
                format!(
                    "Your booking for room {} on {} was rejected by the HOD.",
                    booking.room, when
                ),
            ),
        };
        Self {
            to,
            kind,
            booking_id: booking.id,
            subject,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    NoReceivers { to: String },
    Transport(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoReceivers { to } => write!(f, "no receiver for notice to {to}"),
            DispatchError::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Outbound notification seam. Must not block; the engine never retries.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, notice: &Notice) -> Result<(), DispatchError>;
}

/// In-process broadcast hub: one channel per recipient e-mail plus a firehose.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Notice>>,
    firehose: broadcast::Sender<Notice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            firehose: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to notices for one recipient. Creates the channel if needed.
    pub fn subscribe(&self, email: &str) -> broadcast::Receiver<Notice> {
        let sender = self
            .channels
            .entry(email.to_lowercase())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Subscribe to every notice.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Notice> {
        self.firehose.subscribe()
    }

    pub fn unsubscribe(&self, email: &str) {
        self.channels.remove(&email.to_lowercase());
    }
}

impl Dispatcher for NotifyHub {
    fn dispatch(&self, notice: &Notice) -> Result<(), DispatchError> {
        // Drop channels whose subscribers have all gone away.
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
        let direct = self
            .channels
            .get(&notice.to.email.to_lowercase())
            .is_some_and(|tx| tx.send(notice.clone()).is_ok());
        let relayed = self.firehose.send(notice.clone()).is_ok();
        if direct || relayed {
            Ok(())
        } else {
            Err(DispatchError::NoReceivers {
                to: notice.to.email.clone(),
            })
        }
    }
}

/// Drains the firehose and logs each notice. Stands in for a mail transport.
pub async fn run_relay(department: String, mut rx: broadcast::Receiver<Notice>) {
    loop {
        match rx.recv().await {
            Ok(notice) => {
                info!(
                    department = %department,
                    to = %notice.to.email,
                    kind = notice.kind.as_str(),
                    booking = %notice.booking_id,
                    "notice: {}",
                    notice.subject
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!(department = %department, "relay lagged, skipped {n} notices");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
