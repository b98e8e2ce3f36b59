use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight.
pub type Minute = u16;

pub const PENDING_SUBJECT: &str = "Pending Approval";
pub const APPROVED_SUBJECT: &str = "Approved by Admin";
pub const DEFAULT_LOCATION: &str = "Department of Information Technology";

/// Half-open interval `[start, end)` within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Minute,
    pub end: Minute,
}

impl TimeRange {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "TimeRange start must be before end");
        Self { start, end }
    }

    /// Build from two `"HH:MM"` strings, rejecting empty or inverted ranges.
    pub fn from_clock(start: &str, end: &str) -> Result<Self, TimeParseError> {
        let s = parse_clock(start)?;
        let e = parse_clock(end)?;
        if s >= e {
            return Err(TimeParseError(format!("{start}-{end}: start must be before end")));
        }
        Ok(Self::new(s, e))
    }

    /// Parse a `"HH:MM-HH:MM"` slot.
    pub fn parse_slot(slot: &str) -> Result<Self, TimeParseError> {
        let (start, end) = slot
            .split_once('-')
            .ok_or_else(|| TimeParseError(format!("{slot}: expected HH:MM-HH:MM")))?;
        Self::from_clock(start.trim(), end.trim())
    }

    pub fn duration_minutes(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }

    pub fn start_label(&self) -> String {
        format_clock(self.start)
    }

    pub fn end_label(&self) -> String {
        format_clock(self.end)
    }

    pub fn slot_label(&self) -> String {
        format!("{}-{}", format_clock(self.start), format_clock(self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError(pub String);

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time: {}", self.0)
    }
}

impl std::error::Error for TimeParseError {}

/// Parse a 24-hour `"HH:MM"` clock value.
pub fn parse_clock(s: &str) -> Result<Minute, TimeParseError> {
    let bad = || TimeParseError(format!("{s}: expected HH:MM"));
    let (h, m) = s.split_once(':').ok_or_else(bad)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(bad());
    }
    let h: Minute = h.parse().map_err(|_| bad())?;
    let m: Minute = m.parse().map_err(|_| bad())?;
    // 24:00 is allowed as an end-of-day marker.
    if m > 59 || h > 24 || (h == 24 && m != 0) {
        return Err(bad());
    }
    Ok(h * 60 + m)
}

pub fn format_clock(m: Minute) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// Days the department timetable covers.
    pub const WORKWEEK: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn of(date: NaiveDate) -> Day {
        match date.weekday() {
            Weekday::Mon => Day::Monday,
            Weekday::Tue => Day::Tuesday,
            Weekday::Wed => Day::Wednesday,
            Weekday::Thu => Day::Thursday,
            Weekday::Fri => Day::Friday,
            Weekday::Sat => Day::Saturday,
            Weekday::Sun => Day::Sunday,
        }
    }

    pub fn parse(s: &str) -> Option<Day> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Some(Day::Monday),
            "tuesday" | "tue" => Some(Day::Tuesday),
            "wednesday" | "wed" => Some(Day::Wednesday),
            "thursday" | "thu" => Some(Day::Thursday),
            "friday" | "fri" => Some(Day::Friday),
            "saturday" | "sat" => Some(Day::Saturday),
            "sunday" | "sun" => Some(Day::Sunday),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Teacher,
    Admin,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "Lab Assistant")]
    LabAssistant,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            "hod" => Some(Role::Hod),
            "lab assistant" | "lab_assistant" | "labassistant" => Some(Role::LabAssistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "Teacher",
            Role::Admin => "Admin",
            Role::Hod => "HOD",
            Role::LabAssistant => "Lab Assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomKind {
    Classroom,
    Lab,
}

impl RoomKind {
    pub fn parse(s: &str) -> Option<RoomKind> {
        match s.trim().to_lowercase().as_str() {
            "classroom" => Some(RoomKind::Classroom),
            "lab" => Some(RoomKind::Lab),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Classroom => "Classroom",
            RoomKind::Lab => "Lab",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminStatus {
    Pending,
    Rejected,
    ApprovedByAdmin,
}

impl AdminStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminStatus::Pending => "Pending",
            AdminStatus::Rejected => "Rejected",
            AdminStatus::ApprovedByAdmin => "Approved by Admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HodStatus {
    Pending,
    Granted,
    Rejected,
    NotApplicable,
}

impl HodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HodStatus::Pending => "Pending",
            HodStatus::Granted => "Granted",
            HodStatus::Rejected => "Rejected",
            HodStatus::NotApplicable => "N/A",
        }
    }
}

/// Stage marker on a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    PendingApproval,
    Approved,
    Granted,
    /// Recurring timetable slot entered by staff, not tied to a booking.
    Default,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::PendingApproval => "pendingApproval",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Granted => "granted",
            ApprovalStatus::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminDecision {
    Approve,
    Reject,
}

impl AdminDecision {
    pub fn parse(s: &str) -> Option<AdminDecision> {
        match s.trim().to_lowercase().as_str() {
            "approve" | "approved" => Some(AdminDecision::Approve),
            "reject" | "rejected" => Some(AdminDecision::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HodDecision {
    Grant,
    Reject,
}

impl HodDecision {
    pub fn parse(s: &str) -> Option<HodDecision> {
        match s.trim().to_lowercase().as_str() {
            "grant" | "granted" => Some(HodDecision::Grant),
            "reject" | "rejected" => Some(HodDecision::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGroup {
    pub year: String,
    pub division: String,
}

/// One occupied interval within a room's week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Ulid,
    pub day: Day,
    pub time: TimeRange,
    pub subject: String,
    pub faculty: Vec<String>,
    pub class: Option<ClassGroup>,
    /// Set for booking-derived entries, absent for recurring ones.
    pub date: Option<NaiveDate>,
    pub approval: ApprovalStatus,
}

impl ScheduleEntry {
    pub fn is_recurring(&self) -> bool {
        self.approval == ApprovalStatus::Default
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherRef {
    pub id: Ulid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub teacher: TeacherRef,
    pub room: String,
    pub date: NaiveDate,
    /// Weekday as supplied by the requester. Slot lookups use `weekday()`.
    pub day: Day,
    pub time: TimeRange,
    pub purpose: String,
    pub admin_status: AdminStatus,
    pub hod_status: HodStatus,
    pub expired: bool,
}

impl Booking {
    pub fn new(
        id: Ulid,
        teacher: TeacherRef,
        room: String,
        date: NaiveDate,
        day: Day,
        time: TimeRange,
        purpose: String,
    ) -> Self {
        Self {
            id,
            teacher,
            room,
            date,
            day,
            time,
            purpose,
            admin_status: AdminStatus::Pending,
            hod_status: HodStatus::Pending,
            expired: false,
        }
    }

    pub fn weekday(&self) -> Day {
        Day::of(self.date)
    }

    pub fn time_slot(&self) -> String {
        self.time.slot_label()
    }

    /// Whether the booking still holds its slot.
    pub fn is_active(&self) -> bool {
        !self.expired
            && self.admin_status != AdminStatus::Rejected
            && self.hod_status != HodStatus::Rejected
    }

    pub fn approval_status(&self) -> Option<ApprovalStatus> {
        if !self.is_active() {
            return None;
        }
        Some(match (self.admin_status, self.hod_status) {
            (AdminStatus::ApprovedByAdmin, HodStatus::Granted) => ApprovalStatus::Granted,
            (AdminStatus::ApprovedByAdmin, _) => ApprovalStatus::Approved,
            _ => ApprovalStatus::PendingApproval,
        })
    }

    /// The schedule entry this booking projects onto its room, if it still holds the slot.
    pub fn schedule_entry(&self) -> Option<ScheduleEntry> {
        let approval = self.approval_status()?;
        let subject = match approval {
            ApprovalStatus::Granted => self.purpose.clone(),
            ApprovalStatus::Approved => APPROVED_SUBJECT.to_string(),
            _ => PENDING_SUBJECT.to_string(),
        };
        Some(ScheduleEntry {
            id: self.id,
            day: self.weekday(),
            time: self.time,
            subject,
            faculty: vec![self.teacher.name.clone()],
            class: None,
            date: Some(self.date),
            approval,
        })
    }

    pub fn apply_admin(&mut self, decision: AdminDecision) {
        match decision {
            AdminDecision::Approve => {
                self.admin_status = AdminStatus::ApprovedByAdmin;
                self.hod_status = HodStatus::Pending;
            }
            AdminDecision::Reject => {
                self.admin_status = AdminStatus::Rejected;
                self.hod_status = HodStatus::NotApplicable;
            }
        }
    }

    pub fn apply_hod(&mut self, decision: HodDecision) {
        self.hod_status = match decision {
            HodDecision::Grant => HodStatus::Granted,
            HodDecision::Reject => HodStatus::Rejected,
        };
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub name: String,
    pub kind: RoomKind,
    pub capacity: u32,
    pub location: String,
    /// Recurring (`default`) entries, sorted by `(day, time.start)`.
    pub timetable: Vec<ScheduleEntry>,
    /// All bookings for this room, sorted by `(date, time.start)`.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(name: String, kind: RoomKind, capacity: u32, location: String) -> Self {
        Self {
            name,
            kind,
            capacity,
            location,
            timetable: Vec::new(),
            bookings: Vec::new(),
        }
    }

    /// Insert a timetable entry maintaining `(day, start)` order.
    pub fn insert_entry(&mut self, entry: ScheduleEntry) {
        let key = (entry.day, entry.time.start);
        let pos = self
            .timetable
            .partition_point(|e| (e.day, e.time.start) <= key);
        self.timetable.insert(pos, entry);
    }

    pub fn entry(&self, id: &Ulid) -> Option<&ScheduleEntry> {
        self.timetable.iter().find(|e| e.id == *id)
    }

    pub fn entry_mut(&mut self, id: &Ulid) -> Option<&mut ScheduleEntry> {
        self.timetable.iter_mut().find(|e| e.id == *id)
    }

    pub fn remove_entry(&mut self, id: &Ulid) -> Option<ScheduleEntry> {
        let pos = self.timetable.iter().position(|e| e.id == *id)?;
        Some(self.timetable.remove(pos))
    }

    /// Insert a booking maintaining `(date, start)` order.
    pub fn insert_booking(&mut self, booking: Booking) {
        let key = (booking.date, booking.time.start);
        let pos = self
            .bookings
            .partition_point(|b| (b.date, b.time.start) <= key);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    pub fn remove_booking(&mut self, id: &Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == *id)?;
        Some(self.bookings.remove(pos))
    }

    /// Bookings on one calendar date. Uses binary search on the sorted list.
    pub fn bookings_on(&self, date: NaiveDate) -> &[Booking] {
        let lo = self.bookings.partition_point(|b| b.date < date);
        let hi = self.bookings.partition_point(|b| b.date <= date);
        &self.bookings[lo..hi]
    }

    /// Recurring entries plus the projection of every active booking,
    /// ordered by weekday then start time.
    pub fn schedule(&self) -> Vec<ScheduleEntry> {
        let mut entries = self.timetable.clone();
        entries.extend(self.bookings.iter().filter_map(Booking::schedule_entry));
        entries.sort_by_key(|e| (e.day, e.time.start, e.date));
        entries
    }

    /// Time ranges occupied on `day`. With a `date`, booking entries dated
    /// on other days of the same weekday do not count.
    pub fn occupied(&self, day: Day, date: Option<NaiveDate>) -> Vec<TimeRange> {
        let recurring = self
            .timetable
            .iter()
            .filter(|e| e.day == day)
            .map(|e| e.time);
        let booked = self
            .bookings
            .iter()
            .filter(|b| b.is_active() && b.weekday() == day)
            .filter(|b| date.is_none_or(|d| b.date == d))
            .map(|b| b.time);
        recurring.chain(booked).collect()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            name: self.name.clone(),
            kind: self.kind,
            capacity: self.capacity,
            location: self.location.clone(),
        }
    }
}

/// Entry in the authoritative faculty directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn teacher_ref(&self) -> TeacherRef {
        TeacherRef {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// WAL record format. One event per state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        name: String,
        kind: RoomKind,
        capacity: u32,
        location: String,
    },
    TimetableEntryAdded {
        room: String,
        entry: ScheduleEntry,
    },
    TimetableEntryUpdated {
        room: String,
        id: Ulid,
        subject: String,
        faculty: Vec<String>,
    },
    TimetableEntryRemoved {
        room: String,
        id: Ulid,
    },
    /// Carries the full booking, so compaction can re-emit a decided booking as one event.
    BookingRequested {
        booking: Booking,
    },
    AdminDecided {
        room: String,
        id: Ulid,
        decision: AdminDecision,
    },
    HodDecided {
        room: String,
        id: Ulid,
        decision: HodDecision,
    },
    BookingExpired {
        room: String,
        id: Ulid,
    },
    BookingPurged {
        room: String,
        id: Ulid,
    },
    FacultyAdded {
        faculty: Faculty,
    },
    UserRegistered {
        user: User,
    },
}

impl Event {
    /// The room an event mutates, for room-scoped events.
    pub fn room(&self) -> Option<&str> {
        match self {
            Event::TimetableEntryAdded { room, .. }
            | Event::TimetableEntryUpdated { room, .. }
            | Event::TimetableEntryRemoved { room, .. }
            | Event::AdminDecided { room, .. }
            | Event::HodDecided { room, .. }
            | Event::BookingExpired { room, .. }
            | Event::BookingPurged { room, .. } => Some(room),
            Event::BookingRequested { booking } => Some(&booking.room),
            Event::RoomCreated { .. } | Event::FacultyAdded { .. } | Event::UserRegistered { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub name: String,
    pub kind: RoomKind,
    pub capacity: u32,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAvailability {
    pub room: RoomInfo,
    pub slots: Vec<TimeRange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn teacher() -> TeacherRef {
        TeacherRef {
            id: Ulid::new(),
            name: "Ms. Leena Sahu (LS)".into(),
            email: "leena@dept.edu".into(),
        }
    }

    fn booking_at(d: &str, slot: &str) -> Booking {
        let date = date(d);
        Booking::new(
            Ulid::new(),
            teacher(),
            "Lab1".into(),
            date,
            Day::of(date),
            TimeRange::parse_slot(slot).unwrap(),
            "Makeup Lecture".into(),
        )
    }

    fn recurring(day: Day, slot: &str) -> ScheduleEntry {
        ScheduleEntry {
            id: Ulid::new(),
            day,
            time: TimeRange::parse_slot(slot).unwrap(),
            subject: "Machine Learning".into(),
            faculty: vec!["Dr. Ram Mangulkar (RM)".into()],
            class: None,
            date: None,
            approval: ApprovalStatus::Default,
        }
    }

    #[test]
    fn parse_slot_basics() {
        let r = TimeRange::parse_slot("10:00-10:30").unwrap();
        assert_eq!(r, TimeRange::new(600, 630));
        assert_eq!(r.duration_minutes(), 30);
        assert_eq!(r.slot_label(), "10:00-10:30");
        assert_eq!(TimeRange::parse_slot(" 8:00 - 9:00 ").unwrap().start_label(), "08:00");
    }

    #[test]
    fn parse_slot_rejects_malformed() {
        assert!(TimeRange::parse_slot("10:00").is_err());
        assert!(TimeRange::parse_slot("10:30-10:00").is_err());
        assert!(TimeRange::parse_slot("10:00-10:00").is_err());
        assert!(TimeRange::parse_slot("25:00-26:00").is_err());
        assert!(TimeRange::parse_slot("10:60-11:00").is_err());
        assert!(TimeRange::parse_slot("ten-eleven").is_err());
    }

    #[test]
    fn clock_end_of_day() {
        assert_eq!(parse_clock("24:00").unwrap(), 1440);
        assert!(parse_clock("24:30").is_err());
        assert_eq!(format_clock(1440), "24:00");
    }

    #[test]
    fn overlap_is_half_open() {
        let a = TimeRange::new(600, 660);
        let b = TimeRange::new(630, 690);
        let c = TimeRange::new(660, 720);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(TimeRange::new(500, 800).overlaps(&a));
    }

    #[test]
    fn day_of_date() {
        assert_eq!(Day::of(date("2026-10-16")), Day::Friday);
        assert_eq!(Day::of(date("2026-10-18")), Day::Sunday);
        assert_eq!(Day::parse("wednesday"), Some(Day::Wednesday));
        assert_eq!(Day::parse("Wed"), Some(Day::Wednesday));
        assert_eq!(Day::parse("Someday"), None);
    }

    #[test]
    fn role_names() {
        assert_eq!(Role::parse("HOD"), Some(Role::Hod));
        assert_eq!(Role::parse("lab assistant"), Some(Role::LabAssistant));
        assert_eq!(Role::Hod.as_str(), "HOD");
        assert_eq!(Role::parse("dean"), None);
    }

    #[test]
    fn booking_projection_follows_stage() {
        let mut b = booking_at("2026-10-21", "10:00-10:30");
        let entry = b.schedule_entry().unwrap();
        assert_eq!(entry.id, b.id);
        assert_eq!(entry.day, Day::Wednesday);
        assert_eq!(entry.subject, PENDING_SUBJECT);
        assert_eq!(entry.approval, ApprovalStatus::PendingApproval);
        assert_eq!(entry.faculty, vec!["Ms. Leena Sahu (LS)".to_string()]);
        assert_eq!(entry.date, Some(b.date));

        b.apply_admin(AdminDecision::Approve);
        let entry = b.schedule_entry().unwrap();
        assert_eq!(entry.subject, APPROVED_SUBJECT);
        assert_eq!(entry.approval, ApprovalStatus::Approved);
        assert_eq!(b.hod_status, HodStatus::Pending);

        b.apply_hod(HodDecision::Grant);
        let entry = b.schedule_entry().unwrap();
        assert_eq!(entry.subject, "Makeup Lecture");
        assert_eq!(entry.approval, ApprovalStatus::Granted);
    }

    #[test]
    fn rejected_bookings_project_nothing() {
        let mut admin_rejected = booking_at("2026-10-21", "10:00-10:30");
        admin_rejected.apply_admin(AdminDecision::Reject);
        assert_eq!(admin_rejected.hod_status, HodStatus::NotApplicable);
        assert!(admin_rejected.schedule_entry().is_none());

        let mut hod_rejected = booking_at("2026-10-21", "10:00-10:30");
        hod_rejected.apply_admin(AdminDecision::Approve);
        hod_rejected.apply_hod(HodDecision::Reject);
        assert!(!hod_rejected.is_active());
        assert!(hod_rejected.schedule_entry().is_none());

        let mut expired = booking_at("2026-10-21", "10:00-10:30");
        expired.expired = true;
        assert!(expired.schedule_entry().is_none());
    }

    #[test]
    fn timetable_ordering() {
        let mut rs = RoomState::new("64".into(), RoomKind::Classroom, 70, DEFAULT_LOCATION.into());
        rs.insert_entry(recurring(Day::Tuesday, "09:00-10:00"));
        rs.insert_entry(recurring(Day::Monday, "11:00-12:00"));
        rs.insert_entry(recurring(Day::Monday, "08:00-09:00"));
        let order: Vec<_> = rs.timetable.iter().map(|e| (e.day, e.time.start)).collect();
        assert_eq!(
            order,
            vec![(Day::Monday, 480), (Day::Monday, 660), (Day::Tuesday, 540)]
        );
    }

    #[test]
    fn bookings_on_slices_by_date() {
        let mut rs = RoomState::new("Lab1".into(), RoomKind::Lab, 35, DEFAULT_LOCATION.into());
        rs.insert_booking(booking_at("2026-10-22", "09:00-10:00"));
        rs.insert_booking(booking_at("2026-10-21", "11:00-12:00"));
        rs.insert_booking(booking_at("2026-10-21", "08:00-09:00"));
        rs.insert_booking(booking_at("2026-10-20", "08:00-09:00"));

        let on = rs.bookings_on(date("2026-10-21"));
        assert_eq!(on.len(), 2);
        assert_eq!(on[0].time.start, 480);
        assert_eq!(on[1].time.start, 660);
        assert!(rs.bookings_on(date("2026-10-23")).is_empty());
    }

    #[test]
    fn schedule_merges_recurring_and_bookings() {
        let mut rs = RoomState::new("Lab1".into(), RoomKind::Lab, 35, DEFAULT_LOCATION.into());
        rs.insert_entry(recurring(Day::Wednesday, "08:00-09:00"));
        let b = booking_at("2026-10-21", "10:00-10:30");
        let bid = b.id;
        rs.insert_booking(b);
        let mut rejected = booking_at("2026-10-21", "12:00-13:00");
        rejected.apply_admin(AdminDecision::Reject);
        rs.insert_booking(rejected);

        let schedule = rs.schedule();
        assert_eq!(schedule.len(), 2);
        assert!(schedule[0].is_recurring());
        assert_eq!(schedule[1].id, bid);
    }

    #[test]
    fn occupied_respects_date() {
        let mut rs = RoomState::new("Lab1".into(), RoomKind::Lab, 35, DEFAULT_LOCATION.into());
        rs.insert_entry(recurring(Day::Wednesday, "08:00-09:00"));
        rs.insert_booking(booking_at("2026-10-21", "10:00-10:30"));
        rs.insert_booking(booking_at("2026-10-28", "14:00-15:00"));

        assert_eq!(rs.occupied(Day::Wednesday, None).len(), 3);
        let dated = rs.occupied(Day::Wednesday, Some(date("2026-10-21")));
        assert_eq!(dated, vec![TimeRange::new(480, 540), TimeRange::new(600, 630)]);
        assert!(rs.occupied(Day::Thursday, None).is_empty());
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut rs = RoomState::new("Lab1".into(), RoomKind::Lab, 35, DEFAULT_LOCATION.into());
        rs.insert_entry(recurring(Day::Monday, "08:00-09:00"));
        assert!(rs.remove_entry(&Ulid::new()).is_none());
        assert!(rs.remove_booking(&Ulid::new()).is_none());
        assert_eq!(rs.timetable.len(), 1);
    }

    #[test]
    fn event_room_scope() {
        let b = booking_at("2026-10-21", "10:00-10:30");
        assert_eq!(Event::BookingRequested { booking: b }.room(), Some("Lab1"));
        let created = Event::RoomCreated {
            name: "Lab1".into(),
            kind: RoomKind::Lab,
            capacity: 35,
            location: DEFAULT_LOCATION.into(),
        };
        assert_eq!(created.room(), None);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingRequested {
            booking: booking_at("2026-10-21", "10:00-10:30"),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
