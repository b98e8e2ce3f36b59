use chrono::NaiveDate;

use crate::model::*;

// ── Free-slot Algorithm ──────────────────────────────────────────

/// Free grid slots for one room on `day`.
///
/// The daily `window` is cut into `step`-minute slots aligned to
/// `window.start`; a slot is free when no recurring entry and no active
/// booking projected onto that weekday overlaps it. With a `date`, only
/// bookings on that exact date count.
pub fn free_slots(
    rs: &RoomState,
    day: Day,
    date: Option<NaiveDate>,
    window: TimeRange,
    step: Minute,
) -> Vec<TimeRange> {
    let mut occupied = rs.occupied(day, date);
    occupied.sort_by_key(|t| t.start);
    let occupied = merge_overlapping(&occupied);
    let free = subtract_intervals(&[window], &occupied);
    split_into_slots(&free, window.start, step)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[TimeRange]) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        merged.push(range);
    }
    merged
}

pub fn subtract_intervals(base: &[TimeRange], to_remove: &[TimeRange]) -> Vec<TimeRange> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(TimeRange::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(TimeRange::new(current_start, current_end));
        }
    }

    result
}

/// Cut free ranges into whole grid slots anchored at `origin`.
pub fn split_into_slots(free: &[TimeRange], origin: Minute, step: Minute) -> Vec<TimeRange> {
    if step == 0 {
        return free.to_vec();
    }
    let mut slots = Vec::new();
    for range in free {
        let offset = range.start.saturating_sub(origin);
        let mut cursor = origin + offset.div_ceil(step) * step;
        while cursor + step <= range.end {
            slots.push(TimeRange::new(cursor, cursor + step));
            cursor += step;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const WINDOW: TimeRange = TimeRange { start: 480, end: 1020 };

    fn r(start: &str, end: &str) -> TimeRange {
        TimeRange::from_clock(start, end).unwrap()
    }

    fn room() -> RoomState {
        RoomState::new("65".into(), RoomKind::Classroom, 70, DEFAULT_LOCATION.into())
    }

    fn recurring(day: Day, time: TimeRange) -> ScheduleEntry {
        ScheduleEntry {
            id: Ulid::new(),
            day,
            time,
            subject: "DBMS".into(),
            faculty: vec!["Ms. Neha Katre (NK)".into()],
            class: Some(ClassGroup {
                year: "SE".into(),
                division: "A".into(),
            }),
            date: None,
            approval: ApprovalStatus::Default,
        }
    }

    fn booked(date: &str, time: TimeRange) -> Booking {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        Booking::new(
            Ulid::new(),
            TeacherRef {
                id: Ulid::new(),
                name: "Ms. Leena Sahu (LS)".into(),
                email: "leena@dept.edu".into(),
            },
            "65".into(),
            date,
            Day::of(date),
            time,
            "Seminar".into(),
        )
    }

    // ── subtract_intervals ───────────────────────────────

    #[test]
    fn subtract_middle_punch() {
        let result = subtract_intervals(&[r("08:00", "17:00")], &[r("10:00", "11:00")]);
        assert_eq!(result, vec![r("08:00", "10:00"), r("11:00", "17:00")]);
    }

    #[test]
    fn subtract_overhanging_edges() {
        let result = subtract_intervals(
            &[r("08:00", "17:00")],
            &[r("07:00", "09:00"), r("16:00", "18:00")],
        );
        assert_eq!(result, vec![r("09:00", "16:00")]);
    }

    #[test]
    fn subtract_everything() {
        let result = subtract_intervals(&[r("08:00", "17:00")], &[r("06:00", "20:00")]);
        assert!(result.is_empty());
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_and_adjacent() {
        let merged = merge_overlapping(&[
            r("08:00", "09:00"),
            r("08:30", "10:00"),
            r("10:00", "10:30"),
            r("12:00", "13:00"),
        ]);
        assert_eq!(merged, vec![r("08:00", "10:30"), r("12:00", "13:00")]);
    }

    // ── split_into_slots ─────────────────────────────────

    #[test]
    fn split_aligns_to_grid() {
        // 09:10 free start rounds up to the 09:30 grid line.
        let slots = split_into_slots(&[r("09:10", "10:45")], 480, 30);
        assert_eq!(slots, vec![r("09:30", "10:00"), r("10:00", "10:30")]);
    }

    #[test]
    fn split_drops_partial_slots() {
        let slots = split_into_slots(&[r("08:00", "08:20")], 480, 30);
        assert!(slots.is_empty());
    }

    // ── free_slots ───────────────────────────────────────

    #[test]
    fn empty_room_has_full_grid() {
        let slots = free_slots(&room(), Day::Monday, None, WINDOW, 30);
        assert_eq!(slots.len(), 18);
        assert_eq!(slots[0], r("08:00", "08:30"));
        assert_eq!(slots[17], r("16:30", "17:00"));
    }

    #[test]
    fn recurring_entry_blocks_its_weekday_only() {
        let mut rs = room();
        rs.insert_entry(recurring(Day::Monday, r("09:00", "11:00")));
        let monday = free_slots(&rs, Day::Monday, None, WINDOW, 30);
        assert_eq!(monday.len(), 14);
        assert!(monday.iter().all(|s| !s.overlaps(&r("09:00", "11:00"))));
        assert_eq!(free_slots(&rs, Day::Tuesday, None, WINDOW, 30).len(), 18);
    }

    #[test]
    fn unaligned_entry_blocks_every_touched_slot() {
        let mut rs = room();
        rs.insert_entry(recurring(Day::Monday, r("09:15", "09:45")));
        let slots = free_slots(&rs, Day::Monday, None, WINDOW, 30);
        assert!(!slots.contains(&r("09:00", "09:30")));
        assert!(!slots.contains(&r("09:30", "10:00")));
        assert!(slots.contains(&r("10:00", "10:30")));
    }

    #[test]
    fn dated_query_ignores_other_dates() {
        let mut rs = room();
        // Both are Wednesdays.
        rs.insert_booking(booked("2026-10-21", r("10:00", "10:30")));
        rs.insert_booking(booked("2026-10-28", r("14:00", "15:00")));

        let undated = free_slots(&rs, Day::Wednesday, None, WINDOW, 30);
        assert!(!undated.contains(&r("10:00", "10:30")));
        assert!(!undated.contains(&r("14:00", "14:30")));

        let date = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        let dated = free_slots(&rs, Day::Wednesday, Some(date), WINDOW, 30);
        assert!(!dated.contains(&r("10:00", "10:30")));
        assert!(dated.contains(&r("14:00", "14:30")));
    }

    #[test]
    fn rejected_booking_does_not_block() {
        let mut rs = room();
        let mut b = booked("2026-10-21", r("10:00", "10:30"));
        b.apply_admin(AdminDecision::Reject);
        rs.insert_booking(b);
        let slots = free_slots(&rs, Day::Wednesday, None, WINDOW, 30);
        assert!(slots.contains(&r("10:00", "10:30")));
    }
}
