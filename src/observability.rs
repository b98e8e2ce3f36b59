use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roomslot_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roomslot_query_duration_seconds";

// ── Workflow metrics ────────────────────────────────────────────

/// Counter: booking lifecycle transitions. Labels: transition.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "roomslot_booking_transitions_total";

/// Counter: booking requests refused because the slot was taken.
pub const SLOT_CONFLICTS_TOTAL: &str = "roomslot_slot_conflicts_total";

/// Counter: notices handed to the dispatcher. Labels: status (delivered, dropped).
pub const NOTICES_TOTAL: &str = "roomslot_notices_total";

/// Counter: bookings handled by the expiry sweeper. Labels: outcome (removed, retained, failed).
pub const SWEPT_BOOKINGS_TOTAL: &str = "roomslot_swept_bookings_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomslot_connections_rejected_total";

/// Gauge: number of loaded departments.
pub const TENANTS_ACTIVE: &str = "roomslot_tenants_active";

/// Counter: callers refused by registration lookup or role gate.
pub const AUTH_FAILURES_TOTAL: &str = "roomslot_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomslot_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom { .. } => "insert_room",
        Command::InsertTimetableEntry { .. } => "insert_timetable_entry",
        Command::EditTimetableEntry { .. } => "edit_timetable_entry",
        Command::DeleteTimetableEntry { .. } => "delete_timetable_entry",
        Command::InsertBooking { .. } => "insert_booking",
        Command::AdminDecision { .. } => "admin_decision",
        Command::HodDecision { .. } => "hod_decision",
        Command::InsertFaculty { .. } => "insert_faculty",
        Command::RegisterUser { .. } => "register_user",
        Command::SelectBookings => "select_bookings",
        Command::SelectMyBookings => "select_my_bookings",
        Command::SelectRooms => "select_rooms",
        Command::SelectTimetable { .. } => "select_timetable",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectAvailableRooms { .. } => "select_available_rooms",
        Command::SelectAvailableWeek { .. } => "select_available_week",
        Command::SelectFaculty => "select_faculty",
    }
}
