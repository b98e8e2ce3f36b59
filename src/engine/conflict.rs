use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Trim and bound a required text field.
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    if value.len() > max_len {
        return Err(EngineError::LimitExceeded(field));
    }
    Ok(value.to_string())
}

pub(crate) fn parse_slot(slot: &str) -> Result<TimeRange, EngineError> {
    TimeRange::parse_slot(slot).map_err(|e| EngineError::InvalidTimeSlot(e.to_string()))
}

pub(crate) fn parse_range(start: &str, end: &str) -> Result<TimeRange, EngineError> {
    TimeRange::from_clock(start, end).map_err(|e| EngineError::InvalidTimeSlot(e.to_string()))
}

/// Active bookings on the same date may not overlap. With `strict`, neither
/// may a booking overlap a recurring entry on that weekday.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    date: NaiveDate,
    time: &TimeRange,
    strict: bool,
) -> Result<(), EngineError> {
    for booking in rs.bookings_on(date) {
        if booking.is_active() && booking.time.overlaps(time) {
            return Err(EngineError::SlotConflict(booking.id));
        }
    }
    if strict {
        let day = Day::of(date);
        if let Some(entry) = rs
            .timetable
            .iter()
            .find(|e| e.day == day && e.time.overlaps(time))
        {
            return Err(EngineError::SlotConflict(entry.id));
        }
    }
    Ok(())
}

/// Recurring entries on the same weekday may not overlap each other.
pub(crate) fn check_timetable_overlap(
    rs: &RoomState,
    day: Day,
    time: &TimeRange,
) -> Result<(), EngineError> {
    match rs
        .timetable
        .iter()
        .find(|e| e.day == day && e.time.overlaps(time))
    {
        Some(existing) => Err(EngineError::TimetableConflict(existing.id)),
        None => Ok(()),
    }
}

/// Split a comma-separated faculty list, dropping blanks.
pub(crate) fn split_faculty(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn validate_faculty(raw: &[String]) -> Result<Vec<String>, EngineError> {
    use crate::limits::*;
    let faculty = split_faculty(raw);
    if faculty.is_empty() {
        return Err(EngineError::Validation("faculty is required".into()));
    }
    if faculty.len() > MAX_FACULTY_PER_ENTRY {
        return Err(EngineError::LimitExceeded("too many faculty on entry"));
    }
    if faculty.iter().any(|n| n.len() > MAX_NAME_LEN) {
        return Err(EngineError::LimitExceeded("faculty name too long"));
    }
    Ok(faculty)
}

pub(crate) fn is_booking_id(rs: &RoomState, id: &Ulid) -> bool {
    rs.booking(id).is_some()
}
