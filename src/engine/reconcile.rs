use chrono::NaiveDate;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::{Notice, NoticeKind, Recipient};

use super::conflict::{check_no_conflict, parse_slot, require_text, today};
use super::{Engine, EngineError};

/// A teacher's request for one room on one date.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub room: String,
    pub date: NaiveDate,
    pub day: Day,
    /// `"HH:MM-HH:MM"`
    pub time_slot: String,
    pub purpose: String,
}

fn transition(name: &'static str) {
    metrics::counter!(crate::observability::BOOKING_TRANSITIONS_TOTAL, "transition" => name)
        .increment(1);
}

impl Engine {
    /// Place a Pending/Pending booking and its provisional hold, then notify admins.
    pub async fn request_booking(
        &self,
        teacher: TeacherRef,
        req: BookingRequest,
    ) -> Result<Booking, EngineError> {
        let time = parse_slot(&req.time_slot)?;
        let purpose = require_text("purpose", &req.purpose, MAX_PURPOSE_LEN)?;
        let today = today();
        if req.date < today {
            return Err(EngineError::PastDate(req.date));
        }
        if (req.date - today).num_days() > MAX_BOOKING_HORIZON_DAYS {
            return Err(EngineError::LimitExceeded("booking date too far ahead"));
        }
        if Day::of(req.date) != req.day {
            warn!(
                room = %req.room,
                date = %req.date,
                "supplied weekday {} disagrees with date; using {}",
                req.day,
                Day::of(req.date)
            );
        }

        let rs = self
            .get_room(&req.room)
            .ok_or_else(|| EngineError::RoomNotFound(req.room.clone()))?;
        let mut guard = rs.write().await;
        if guard.bookings.iter().filter(|b| b.is_active()).count() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        if let Err(e) = check_no_conflict(&guard, req.date, &time, self.settings.strict_timetable) {
            metrics::counter!(crate::observability::SLOT_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let booking = Booking::new(
            Ulid::new(),
            teacher,
            guard.name.clone(),
            req.date,
            req.day,
            time,
            purpose,
        );
        let event = Event::BookingRequested {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);

        transition("requested");
        info!(
            booking = %booking.id,
            room = %booking.room,
            date = %booking.date,
            slot = %booking.time_slot(),
            "booking requested by {}",
            booking.teacher.email
        );

        let notices = self
            .users_with_role(Role::Admin)
            .iter()
            .map(|admin| Notice::render(NoticeKind::BookingRequested, admin.into(), &booking))
            .collect();
        self.dispatch(notices);
        Ok(booking)
    }

    /// First approval stage. Approve relabels the hold, reject releases it.
    pub async fn admin_decide(
        &self,
        id: Ulid,
        decision: AdminDecision,
    ) -> Result<Booking, EngineError> {
        let (room, mut guard) = self
            .resolve_entity_write(&id)
            .await
            .ok_or(EngineError::BookingNotFound(id))?;
        let current = guard.booking(&id).ok_or(EngineError::BookingNotFound(id))?;
        if current.expired {
            return Err(EngineError::AlreadyProcessed {
                id,
                status: "expired",
            });
        }
        if current.admin_status != AdminStatus::Pending {
            return Err(EngineError::AlreadyProcessed {
                id,
                status: current.admin_status.as_str(),
            });
        }

        let event = Event::AdminDecided { room, id, decision };
        self.persist_and_apply(&mut guard, &event).await?;
        let booking = guard
            .booking(&id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))?;
        drop(guard);

        let teacher = Recipient {
            name: booking.teacher.name.clone(),
            email: booking.teacher.email.clone(),
        };
        let notices = match decision {
            AdminDecision::Approve => {
                transition("admin_approved");
                let mut notices: Vec<Notice> = self
                    .users_with_role(Role::Hod)
                    .iter()
                    .map(|hod| Notice::render(NoticeKind::AwaitingHod, hod.into(), &booking))
                    .collect();
                notices.push(Notice::render(NoticeKind::AdminApproved, teacher, &booking));
                notices
            }
            AdminDecision::Reject => {
                transition("admin_rejected");
                vec![Notice::render(NoticeKind::AdminRejected, teacher, &booking)]
            }
        };
        info!(
            booking = %id,
            room = %booking.room,
            "admin decision: {}",
            booking.admin_status.as_str()
        );
        self.dispatch(notices);
        Ok(booking)
    }

    /// Final approval stage. Grant confirms the slot under the booking's purpose.
    pub async fn hod_decide(&self, id: Ulid, decision: HodDecision) -> Result<Booking, EngineError> {
        let (room, mut guard) = self
            .resolve_entity_write(&id)
            .await
            .ok_or(EngineError::BookingNotFound(id))?;
        let current = guard.booking(&id).ok_or(EngineError::BookingNotFound(id))?;
        if current.expired {
            return Err(EngineError::AlreadyProcessed {
                id,
                status: "expired",
            });
        }
        if current.admin_status != AdminStatus::ApprovedByAdmin {
            return Err(EngineError::NotYetApproved(id));
        }
        if current.hod_status != HodStatus::Pending {
            return Err(EngineError::AlreadyProcessed {
                id,
                status: current.hod_status.as_str(),
            });
        }

        let event = Event::HodDecided { room, id, decision };
        self.persist_and_apply(&mut guard, &event).await?;
        let booking = guard
            .booking(&id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))?;
        drop(guard);

        let teacher = Recipient {
            name: booking.teacher.name.clone(),
            email: booking.teacher.email.clone(),
        };
        let kind = match decision {
            HodDecision::Grant => {
                transition("hod_granted");
                NoticeKind::HodGranted
            }
            HodDecision::Reject => {
                transition("hod_rejected");
                NoticeKind::HodRejected
            }
        };
        info!(
            booking = %id,
            room = %booking.room,
            "hod decision: {}",
            booking.hod_status.as_str()
        );
        self.dispatch(vec![Notice::render(kind, teacher, &booking)]);
        Ok(booking)
    }
}
