use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_timetable_overlap, is_booking_id, parse_range, require_text, validate_faculty};
use super::{Engine, EngineError, WalCommand};

/// A recurring timetable slot as entered by staff.
#[derive(Debug, Clone)]
pub struct NewTimetableEntry {
    pub room: String,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    /// Names, each possibly a comma-separated list.
    pub faculty: Vec<String>,
    pub class: Option<ClassGroup>,
}

impl Engine {
    pub async fn create_room(
        &self,
        name: &str,
        kind: RoomKind,
        capacity: u32,
        location: Option<&str>,
    ) -> Result<RoomInfo, EngineError> {
        let name = require_text("room name", name, MAX_NAME_LEN)?;
        if capacity == 0 {
            return Err(EngineError::Validation("capacity must be positive".into()));
        }
        if capacity > MAX_CAPACITY {
            return Err(EngineError::LimitExceeded("room capacity"));
        }
        let location = match location.map(str::trim).filter(|l| !l.is_empty()) {
            Some(l) => require_text("location", l, MAX_NAME_LEN)?,
            None => DEFAULT_LOCATION.to_string(),
        };

        let _catalog = self.catalog_lock.lock().await;
        if self.state.len() >= MAX_ROOMS_PER_DEPARTMENT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.state.contains_key(&name) {
            return Err(EngineError::RoomExists(name));
        }

        let event = Event::RoomCreated {
            name: name.clone(),
            kind,
            capacity,
            location: location.clone(),
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(name.clone(), kind, capacity, location);
        let info = rs.info();
        self.state.insert(name, Arc::new(RwLock::new(rs)));
        info!(room = %info.name, kind = info.kind.as_str(), "room created");
        Ok(info)
    }

    pub async fn add_timetable_entry(
        &self,
        new: NewTimetableEntry,
    ) -> Result<ScheduleEntry, EngineError> {
        let time = parse_range(&new.start_time, &new.end_time)?;
        let subject = require_text("subject", &new.subject, MAX_SUBJECT_LEN)?;
        let faculty = validate_faculty(&new.faculty)?;
        let class = match new.class {
            Some(c) => Some(ClassGroup {
                year: require_text("year", &c.year, MAX_NAME_LEN)?,
                division: require_text("division", &c.division, MAX_NAME_LEN)?,
            }),
            None => None,
        };

        let rs = self
            .get_room(&new.room)
            .ok_or_else(|| EngineError::RoomNotFound(new.room.clone()))?;
        let mut guard = rs.write().await;
        if guard.timetable.len() >= MAX_TIMETABLE_ENTRIES_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many timetable entries on room"));
        }
        check_timetable_overlap(&guard, new.day, &time)?;

        let entry = ScheduleEntry {
            id: Ulid::new(),
            day: new.day,
            time,
            subject,
            faculty,
            class,
            date: None,
            approval: ApprovalStatus::Default,
        };
        let event = Event::TimetableEntryAdded {
            room: guard.name.clone(),
            entry: entry.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(room = %new.room, entry = %entry.id, day = %entry.day, "timetable entry added");
        Ok(entry)
    }

    /// Change subject and faculty of a recurring entry.
    pub async fn update_timetable_entry(
        &self,
        id: Ulid,
        subject: &str,
        faculty: &[String],
    ) -> Result<ScheduleEntry, EngineError> {
        let subject = require_text("subject", subject, MAX_SUBJECT_LEN)?;
        let faculty = validate_faculty(faculty)?;
        let (room, mut guard) = self
            .resolve_entity_write(&id)
            .await
            .ok_or(EngineError::EntryNotFound(id))?;
        if is_booking_id(&guard, &id) {
            return Err(EngineError::NotEditable(id));
        }
        if guard.entry(&id).is_none() {
            return Err(EngineError::EntryNotFound(id));
        }

        let event = Event::TimetableEntryUpdated {
            room,
            id,
            subject,
            faculty,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        guard.entry(&id).cloned().ok_or(EngineError::EntryNotFound(id))
    }

    pub async fn remove_timetable_entry(&self, id: Ulid) -> Result<String, EngineError> {
        let (room, mut guard) = self
            .resolve_entity_write(&id)
            .await
            .ok_or(EngineError::EntryNotFound(id))?;
        if is_booking_id(&guard, &id) {
            return Err(EngineError::NotEditable(id));
        }
        if guard.entry(&id).is_none() {
            return Err(EngineError::EntryNotFound(id));
        }
        let event = Event::TimetableEntryRemoved {
            room: room.clone(),
            id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(room = %room, entry = %id, "timetable entry removed");
        Ok(room)
    }

    /// Insert or re-role a directory entry.
    pub async fn add_faculty(&self, name: &str, role: Role) -> Result<Faculty, EngineError> {
        let name = require_text("faculty name", name, MAX_NAME_LEN)?;
        let _catalog = self.catalog_lock.lock().await;
        if !self.faculty.contains_key(&name) && self.faculty.len() >= MAX_FACULTY {
            return Err(EngineError::LimitExceeded("faculty directory full"));
        }
        let faculty = Faculty { name, role };
        if self.faculty.get(&faculty.name).is_some_and(|f| *f == faculty) {
            return Ok(faculty);
        }
        self.persist_directory(&Event::FacultyAdded {
            faculty: faculty.clone(),
        })
        .await?;
        Ok(faculty)
    }

    /// Add any seed entries not already present. Existing roles are left alone.
    pub async fn seed_faculty(&self, seed: &[Faculty]) -> Result<usize, EngineError> {
        let mut added = 0;
        for f in seed {
            if self.find_faculty(&f.name).is_none() {
                self.add_faculty(&f.name, f.role).await?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Register a user whose name is in the faculty directory. The role comes
    /// from the directory, never from the caller.
    pub async fn register_user(&self, name: &str, email: &str) -> Result<User, EngineError> {
        let name = require_text("name", name, MAX_NAME_LEN)?;
        let email = require_text("email", email, MAX_EMAIL_LEN)?;
        if !email.contains('@') {
            return Err(EngineError::Validation(format!("invalid email: {email}")));
        }

        let _catalog = self.catalog_lock.lock().await;
        let faculty = self
            .find_faculty(&name)
            .ok_or_else(|| EngineError::NotInDirectory(name.clone()))?;
        let key = email.to_lowercase();
        if self.users.contains_key(&key) {
            return Err(EngineError::UserExists(email));
        }
        if self.users.len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }

        let user = User {
            id: Ulid::new(),
            name: faculty.name,
            email,
            role: faculty.role,
        };
        self.persist_directory(&Event::UserRegistered { user: user.clone() })
            .await?;
        info!(email = %user.email, role = user.role.as_str(), "user registered");
        Ok(user)
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    ///
    /// The catalog lock and every room's read lock are held until the swap
    /// completes, so no append can land in the file being replaced.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        let mut events: Vec<Event> = self
            .faculty
            .iter()
            .map(|f| Event::FacultyAdded { faculty: f.value().clone() })
            .collect();
        events.extend(
            self.users
                .iter()
                .map(|u| Event::UserRegistered { user: u.value().clone() }),
        );

        let rooms: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut guards = Vec::with_capacity(rooms.len());
        for rs in rooms {
            let guard = rs.read_owned().await;
            events.push(Event::RoomCreated {
                name: guard.name.clone(),
                kind: guard.kind,
                capacity: guard.capacity,
                location: guard.location.clone(),
            });
            events.extend(guard.timetable.iter().map(|entry| Event::TimetableEntryAdded {
                room: guard.name.clone(),
                entry: entry.clone(),
            }));
            // A booking snapshot carries its current statuses.
            events.extend(
                guard
                    .bookings
                    .iter()
                    .map(|b| Event::BookingRequested { booking: b.clone() }),
            );
            guards.push(guard);
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guards);
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
