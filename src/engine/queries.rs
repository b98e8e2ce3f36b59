use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::availability::free_slots;
use super::conflict::today;
use super::{Engine, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    /// Bookings requested by one user.
    Teacher(Ulid),
}

impl Engine {
    /// All bookings matching `filter`, ordered by date, start time, room.
    /// Runs the expiry sweeper first.
    pub async fn list_bookings(&self, filter: BookingFilter) -> Vec<Booking> {
        self.sweep_expired(today()).await;

        let rooms: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for rs in rooms {
            let guard = rs.read().await;
            out.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| match filter {
                        BookingFilter::All => true,
                        BookingFilter::Teacher(id) => b.teacher.id == id,
                    })
                    .cloned(),
            );
        }
        out.sort_by(|a, b| {
            (a.date, a.time.start, &a.room).cmp(&(b.date, b.time.start, &b.room))
        });
        out
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let rs = self
            .get_room_for_entity(&id)
            .and_then(|room| self.get_room(&room))
            .ok_or(EngineError::BookingNotFound(id))?;
        let guard = rs.read().await;
        guard
            .booking(&id)
            .cloned()
            .ok_or(EngineError::BookingNotFound(id))
    }

    pub async fn room_info(&self, name: &str) -> Result<RoomInfo, EngineError> {
        let rs = self
            .get_room(name)
            .ok_or_else(|| EngineError::RoomNotFound(name.to_string()))?;
        let guard = rs.read().await;
        Ok(guard.info())
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let rooms: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(rooms.len());
        for rs in rooms {
            out.push(rs.read().await.info());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Recurring entries plus the live projection of every active booking.
    pub async fn timetable(&self, room: &str) -> Result<Vec<ScheduleEntry>, EngineError> {
        let rs = self
            .get_room(room)
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;
        let guard = rs.read().await;
        Ok(guard.schedule())
    }

    pub async fn free_slots(
        &self,
        room: &str,
        day: Day,
        date: Option<NaiveDate>,
    ) -> Result<Vec<TimeRange>, EngineError> {
        if let Some(d) = date
            && Day::of(d) != day
        {
            return Err(EngineError::Validation(format!(
                "{d} is a {}, not a {day}",
                Day::of(d)
            )));
        }
        let rs = self
            .get_room(room)
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;
        let guard = rs.read().await;
        Ok(free_slots(
            &guard,
            day,
            date,
            self.settings.day_window,
            self.settings.slot_minutes,
        ))
    }

    /// Every room with its free slots on `day`, ordered by room name.
    pub async fn available_rooms(&self, day: Day) -> Vec<RoomAvailability> {
        let rooms: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(rooms.len());
        for rs in rooms {
            let guard = rs.read().await;
            out.push(RoomAvailability {
                room: guard.info(),
                slots: free_slots(
                    &guard,
                    day,
                    None,
                    self.settings.day_window,
                    self.settings.slot_minutes,
                ),
            });
        }
        out.sort_by(|a, b| a.room.name.cmp(&b.room.name));
        out
    }

    /// Free slots for each working day, Monday to Saturday.
    pub async fn available_week(
        &self,
        room: &str,
    ) -> Result<Vec<(Day, Vec<TimeRange>)>, EngineError> {
        let rs = self
            .get_room(room)
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;
        let guard = rs.read().await;
        Ok(Day::WORKWEEK
            .iter()
            .map(|&day| {
                let slots = free_slots(
                    &guard,
                    day,
                    None,
                    self.settings.day_window,
                    self.settings.slot_minutes,
                );
                (day, slots)
            })
            .collect())
    }

    pub fn list_faculty(&self) -> Vec<Faculty> {
        let mut out: Vec<Faculty> = self.faculty.iter().map(|e| e.value().clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn find_faculty(&self, name: &str) -> Option<Faculty> {
        self.faculty.get(name.trim()).map(|e| e.value().clone())
    }

    /// Resolve a connection's e-mail to a registered user.
    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .get(&email.trim().to_lowercase())
            .map(|e| e.value().clone())
    }

    pub fn users_with_role(&self, role: Role) -> Vec<User> {
        let mut out: Vec<User> = self
            .users
            .iter()
            .filter(|e| e.value().role == role)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| a.email.cmp(&b.email));
        out
    }
}
