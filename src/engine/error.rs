use chrono::NaiveDate;
use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    RoomNotFound(String),
    BookingNotFound(Ulid),
    EntryNotFound(Ulid),
    RoomExists(String),
    /// An active booking (or, in strict mode, a recurring entry) already holds the slot.
    SlotConflict(Ulid),
    TimetableConflict(Ulid),
    PastDate(NaiveDate),
    AlreadyProcessed {
        id: Ulid,
        status: &'static str,
    },
    NotYetApproved(Ulid),
    /// Booking-derived entries follow their booking and cannot be edited directly.
    NotEditable(Ulid),
    InvalidTimeSlot(String),
    Validation(String),
    NotInDirectory(String),
    UserExists(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::RoomNotFound(name) => write!(f, "room not found: {name}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::EntryNotFound(id) => write!(f, "schedule entry not found: {id}"),
            EngineError::RoomExists(name) => write!(f, "room already exists: {name}"),
            EngineError::SlotConflict(id) => {
                write!(f, "slot already taken for this room and date (held by {id})")
            }
            EngineError::TimetableConflict(id) => {
                write!(f, "overlaps timetable entry {id} on the same day")
            }
            EngineError::PastDate(date) => write!(f, "cannot book a past date: {date}"),
            EngineError::AlreadyProcessed { id, status } => {
                write!(f, "booking {id} already processed: {status}")
            }
            EngineError::NotYetApproved(id) => {
                write!(f, "booking {id} has not been approved by an admin")
            }
            EngineError::NotEditable(id) => {
                write!(f, "schedule entry {id} belongs to a booking and cannot be edited")
            }
            EngineError::InvalidTimeSlot(msg) => write!(f, "{msg}"),
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::NotInDirectory(name) => {
                write!(f, "{name} is not in the faculty directory")
            }
            EngineError::UserExists(email) => write!(f, "user already registered: {email}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
