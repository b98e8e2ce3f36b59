// Hard caps on per-department state. Anything beyond these is rejected with
// `EngineError::LimitExceeded` before it reaches the WAL.

pub const MAX_ROOMS_PER_DEPARTMENT: usize = 1_000;
pub const MAX_TIMETABLE_ENTRIES_PER_ROOM: usize = 500;
/// Active bookings only; rejected and retained expired records do not count.
pub const MAX_BOOKINGS_PER_ROOM: usize = 10_000;
pub const MAX_FACULTY: usize = 5_000;
pub const MAX_USERS: usize = 5_000;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_SUBJECT_LEN: usize = 256;
pub const MAX_PURPOSE_LEN: usize = 512;
pub const MAX_FACULTY_PER_ENTRY: usize = 16;
pub const MAX_CAPACITY: u32 = 10_000;

pub const MAX_TENANTS: usize = 1_000;
pub const MAX_TENANT_NAME_LEN: usize = 64;

/// How far ahead a booking may be requested.
pub const MAX_BOOKING_HORIZON_DAYS: i64 = 366;
