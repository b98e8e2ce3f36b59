mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod reconcile;
mod sweep;

pub use availability::{free_slots, merge_overlapping, split_into_slots, subtract_intervals};
pub use error::EngineError;
pub use mutations::NewTimetableEntry;
pub use queries::BookingFilter;
pub use reconcile::BookingRequest;
pub use sweep::SweepReport;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::model::*;
use crate::notify::{Dispatcher, Notice};
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// What the sweeper does with a booking whose date has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    #[default]
    Delete,
    /// Keep the record, flagged `expired`, for audit.
    Retain,
}

impl ExpiryPolicy {
    pub fn parse(s: &str) -> Option<ExpiryPolicy> {
        match s.trim().to_lowercase().as_str() {
            "delete" => Some(ExpiryPolicy::Delete),
            "retain" => Some(ExpiryPolicy::Retain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub expiry_policy: ExpiryPolicy,
    /// Reject bookings that overlap a recurring timetable entry.
    pub strict_timetable: bool,
    /// Daily window the availability grid covers.
    pub day_window: TimeRange,
    pub slot_minutes: Minute,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            expiry_policy: ExpiryPolicy::Delete,
            strict_timetable: false,
            day_window: TimeRange::new(8 * 60, 17 * 60),
            slot_minutes: 30,
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first append, drains whatever else is queued, then pays a
/// single fsync for the whole batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, &batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        warn!("WAL flush failed for {} events: {e}", batch.len());
    }
    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so stale bytes don't leak into the next batch.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}

/// One department's rooms, bookings and directory.
pub struct Engine {
    /// Room name → room state. Room names are the join key everywhere.
    pub state: DashMap<String, SharedRoomState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<dyn Dispatcher>,
    /// Reverse lookup: booking or timetable entry id → room name.
    pub(super) entity_to_room: DashMap<Ulid, String>,
    /// Faculty directory, keyed by display name.
    pub(super) faculty: DashMap<String, Faculty>,
    /// Registered users, keyed by lower-cased e-mail.
    pub(super) users: DashMap<String, User>,
    /// Serializes room creation and directory writes.
    pub(super) catalog_lock: Mutex<()>,
    pub settings: EngineSettings,
}

/// Apply a room-scoped event. Caller holds the room lock.
fn apply_to_room(rs: &mut RoomState, event: &Event, entity_map: &DashMap<Ulid, String>) {
    match event {
        Event::TimetableEntryAdded { room, entry } => {
            entity_map.insert(entry.id, room.clone());
            rs.insert_entry(entry.clone());
        }
        Event::TimetableEntryUpdated {
            id,
            subject,
            faculty,
            ..
        } => {
            if let Some(entry) = rs.entry_mut(id) {
                entry.subject = subject.clone();
                entry.faculty = faculty.clone();
            }
        }
        Event::TimetableEntryRemoved { id, .. } => {
            rs.remove_entry(id);
            entity_map.remove(id);
        }
        Event::BookingRequested { booking } => {
            entity_map.insert(booking.id, booking.room.clone());
            rs.insert_booking(booking.clone());
        }
        Event::AdminDecided { id, decision, .. } => {
            if let Some(b) = rs.booking_mut(id) {
                b.apply_admin(*decision);
            }
        }
        Event::HodDecided { id, decision, .. } => {
            if let Some(b) = rs.booking_mut(id) {
                b.apply_hod(*decision);
            }
        }
        Event::BookingExpired { id, .. } => {
            if let Some(b) = rs.booking_mut(id) {
                b.expired = true;
            }
        }
        Event::BookingPurged { id, .. } => {
            rs.remove_booking(id);
            entity_map.remove(id);
        }
        // Handled at the department level.
        Event::RoomCreated { .. } | Event::FacultyAdded { .. } | Event::UserRegistered { .. } => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<dyn Dispatcher>,
        settings: EngineSettings,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            entity_to_room: DashMap::new(),
            faculty: DashMap::new(),
            users: DashMap::new(),
            catalog_lock: Mutex::new(()),
            settings,
        };

        // Sole owner of every Arc during replay, so try_write always succeeds.
        // Never blocking_write here: this can run inside the async runtime.
        for event in &events {
            match event {
                Event::RoomCreated {
                    name,
                    kind,
                    capacity,
                    location,
                } => {
                    let rs = RoomState::new(name.clone(), *kind, *capacity, location.clone());
                    engine.state.insert(name.clone(), Arc::new(RwLock::new(rs)));
                }
                Event::FacultyAdded { .. } | Event::UserRegistered { .. } => {
                    engine.apply_directory(event);
                }
                other => {
                    if let Some(room) = other.room()
                        && let Some(entry) = engine.state.get(room)
                    {
                        let rs_arc = entry.clone();
                        let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                        apply_to_room(&mut guard, other, &engine.entity_to_room);
                    }
                }
            }
        }
        debug!(
            path = %wal_path.display(),
            events = events.len(),
            rooms = engine.state.len(),
            "engine replayed"
        );

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, name: &str) -> Option<SharedRoomState> {
        self.state.get(name).map(|e| e.value().clone())
    }

    pub fn get_room_for_entity(&self, entity_id: &Ulid) -> Option<String> {
        self.entity_to_room.get(entity_id).map(|e| e.value().clone())
    }

    /// WAL-append then apply. Caller holds the room's write lock across both.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.entity_to_room);
        Ok(())
    }

    /// WAL-append then apply a directory event. Caller holds `catalog_lock`.
    pub(super) async fn persist_directory(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_directory(event);
        Ok(())
    }

    fn apply_directory(&self, event: &Event) {
        match event {
            Event::FacultyAdded { faculty } => {
                self.faculty.insert(faculty.name.clone(), faculty.clone());
            }
            Event::UserRegistered { user } => {
                self.users.insert(user.email.to_lowercase(), user.clone());
            }
            _ => {}
        }
    }

    /// Lookup entity → room, acquire that room's write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Option<(String, OwnedRwLockWriteGuard<RoomState>)> {
        let room = self.get_room_for_entity(entity_id)?;
        let rs = self.get_room(&room)?;
        let guard = rs.write_owned().await;
        Some((room, guard))
    }

    /// Hand notices to the dispatcher. Failures are logged and counted, never returned.
    pub(super) fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            match self.notify.dispatch(&notice) {
                Ok(()) => {
                    metrics::counter!(crate::observability::NOTICES_TOTAL, "status" => "delivered")
                        .increment(1);
                    debug!(
                        to = %notice.to.email,
                        kind = notice.kind.as_str(),
                        booking = %notice.booking_id,
                        "notice dispatched"
                    );
                }
                Err(e) => {
                    metrics::counter!(crate::observability::NOTICES_TOTAL, "status" => "dropped")
                        .increment(1);
                    warn!(
                        to = %notice.to.email,
                        kind = notice.kind.as_str(),
                        booking = %notice.booking_id,
                        "notice dropped: {e}"
                    );
                }
            }
        }
    }
}
