use chrono::NaiveDate;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError, ExpiryPolicy};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub retained: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.retained == 0 && self.failed == 0
    }
}

impl Engine {
    /// Bookings dated strictly before `today` that the sweeper has not handled yet.
    pub async fn collect_expired_bookings(&self, today: NaiveDate) -> Vec<(Ulid, String)> {
        let rooms: Vec<_> = self
            .state
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut expired = Vec::new();
        for (name, rs) in rooms {
            let guard = rs.read().await;
            let past = guard.bookings.partition_point(|b| b.date < today);
            expired.extend(
                guard.bookings[..past]
                    .iter()
                    .filter(|b| !b.expired)
                    .map(|b| (b.id, name.clone())),
            );
        }
        expired
    }

    /// Release every past booking. A failure on one booking is logged and the
    /// sweep moves on.
    pub async fn sweep_expired(&self, today: NaiveDate) -> SweepReport {
        let mut report = SweepReport::default();
        for (id, room) in self.collect_expired_bookings(today).await {
            match self.expire_booking(&room, id, today).await {
                Ok(Some(ExpiryPolicy::Delete)) => report.removed += 1,
                Ok(Some(ExpiryPolicy::Retain)) => report.retained += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(booking = %id, room = %room, "failed to expire booking: {e}");
                    report.failed += 1;
                }
            }
        }
        if !report.is_empty() {
            let counter = |outcome: &'static str, n: usize| {
                metrics::counter!(crate::observability::SWEPT_BOOKINGS_TOTAL, "outcome" => outcome)
                    .increment(n as u64);
            };
            counter("removed", report.removed);
            counter("retained", report.retained);
            counter("failed", report.failed);
            info!(
                removed = report.removed,
                retained = report.retained,
                failed = report.failed,
                "expired bookings swept"
            );
        }
        report
    }

    /// Re-checks under the room lock; `None` if another sweep got there first.
    async fn expire_booking(
        &self,
        room: &str,
        id: Ulid,
        today: NaiveDate,
    ) -> Result<Option<ExpiryPolicy>, EngineError> {
        let rs = self
            .get_room(room)
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;
        let mut guard = rs.write().await;
        let still_due = guard
            .booking(&id)
            .is_some_and(|b| !b.expired && b.date < today);
        if !still_due {
            return Ok(None);
        }
        let policy = self.settings.expiry_policy;
        let event = match policy {
            ExpiryPolicy::Delete => Event::BookingPurged {
                room: room.to_string(),
                id,
            },
            ExpiryPolicy::Retain => Event::BookingExpired {
                room: room.to_string(),
                id,
            },
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(Some(policy))
    }
}
