use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::auth::{self, AuthError, RoomSlotAuthSource};
use crate::engine::{BookingFilter, BookingRequest, Engine, EngineError, NewTimetableEntry};
use crate::model::*;
use crate::observability::{self, command_label};
use crate::sql::{self, Command, SqlError, StatementKind};
use crate::tenant::TenantManager;

const BOOKING_COLUMNS: &[&str] = &[
    "id",
    "teacher_name",
    "teacher_email",
    "room",
    "date",
    "day",
    "time_slot",
    "purpose",
    "admin_status",
    "hod_status",
    "approval_status",
];
const ROOM_COLUMNS: &[&str] = &["name", "type", "capacity", "location"];
const TIMETABLE_COLUMNS: &[&str] = &[
    "id",
    "room",
    "day",
    "start_time",
    "end_time",
    "subject",
    "faculty",
    "year",
    "division",
    "date",
    "approval_status",
];
const SLOT_COLUMNS: &[&str] = &["room", "day", "start_time", "end_time"];
const AVAILABLE_ROOM_COLUMNS: &[&str] = &["room", "type", "capacity", "location", "free_slots"];
const WEEK_COLUMNS: &[&str] = &["room", "day", "free_slots"];
const FACULTY_COLUMNS: &[&str] = &["name", "role"];
const USER_COLUMNS: &[&str] = &["id", "name", "email", "role"];

type Row = Vec<Option<String>>;

/// Connected caller: the department engine plus the identity behind the
/// `user` startup parameter, when registered.
struct Session {
    engine: Arc<Engine>,
    email: String,
    user: Option<User>,
}

impl Session {
    fn authorize(&self, allowed: &[Role], action: &'static str) -> PgWireResult<&User> {
        auth::authorize(self.user.as_ref(), &self.email, allowed, action).map_err(|e| {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            debug!(email = %self.email, "refused: {e}");
            auth_err(e)
        })
    }
}

pub struct RoomSlotHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<RoomSlotQueryParser>,
}

impl RoomSlotHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(RoomSlotQueryParser),
        }
    }

    async fn resolve_session<C: ClientInfo>(&self, client: &C) -> PgWireResult<Session> {
        let metadata = client.metadata();
        let department = metadata
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        let email = metadata.get("user").cloned().unwrap_or_default();
        let engine = self
            .tenant_manager
            .get_or_create(&department)
            .await
            .map_err(|e| user_error("08006", format!("department error: {e}")))?;
        let user = engine.user_by_email(&email);
        Ok(Session {
            engine,
            email,
            user,
        })
    }

    async fn run(&self, session: &Session, sql: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(session, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, session: &Session, cmd: Command) -> PgWireResult<Response> {
        let engine = &session.engine;
        match cmd {
            Command::InsertRoom {
                name,
                kind,
                capacity,
                location,
            } => {
                session.authorize(&[Role::Admin], "add rooms")?;
                engine
                    .create_room(&name, kind, capacity, location.as_deref())
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::InsertTimetableEntry {
                room,
                day,
                start_time,
                end_time,
                subject,
                faculty,
                class,
            } => {
                session.authorize(&[Role::Admin, Role::LabAssistant], "edit timetables")?;
                let entry = engine
                    .add_timetable_entry(NewTimetableEntry {
                        room: room.clone(),
                        day,
                        start_time,
                        end_time,
                        subject,
                        faculty,
                        class,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(rows_response(TIMETABLE_COLUMNS, vec![timetable_row(&room, &entry)]))
            }
            Command::EditTimetableEntry {
                id,
                subject,
                faculty,
            } => {
                session.authorize(&[Role::Admin, Role::LabAssistant], "edit timetables")?;
                let entry = engine
                    .update_timetable_entry(id, &subject, &faculty)
                    .await
                    .map_err(engine_err)?;
                let room = engine.get_room_for_entity(&id).unwrap_or_default();
                Ok(rows_response(TIMETABLE_COLUMNS, vec![timetable_row(&room, &entry)]))
            }
            Command::DeleteTimetableEntry { id } => {
                session.authorize(&[Role::Admin, Role::LabAssistant], "edit timetables")?;
                engine.remove_timetable_entry(id).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertBooking {
                room,
                date,
                day,
                time_slot,
                purpose,
            } => {
                let user = session.authorize(&[], "request bookings")?;
                let booking = engine
                    .request_booking(
                        user.teacher_ref(),
                        BookingRequest {
                            room,
                            date,
                            day,
                            time_slot,
                            purpose,
                        },
                    )
                    .await
                    .map_err(engine_err)?;
                Ok(rows_response(BOOKING_COLUMNS, vec![booking_row(&booking)]))
            }
            Command::AdminDecision {
                booking_id,
                decision,
            } => {
                session.authorize(&[Role::Admin], "review bookings")?;
                let booking = engine
                    .admin_decide(booking_id, decision)
                    .await
                    .map_err(engine_err)?;
                Ok(rows_response(BOOKING_COLUMNS, vec![booking_row(&booking)]))
            }
            Command::HodDecision {
                booking_id,
                decision,
            } => {
                session.authorize(&[Role::Hod], "grant bookings")?;
                let booking = engine
                    .hod_decide(booking_id, decision)
                    .await
                    .map_err(engine_err)?;
                Ok(rows_response(BOOKING_COLUMNS, vec![booking_row(&booking)]))
            }
            Command::InsertFaculty { name, role } => {
                session.authorize(&[Role::Admin], "add faculty")?;
                engine.add_faculty(&name, role).await.map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::RegisterUser { name, email } => {
                let user = engine.register_user(&name, &email).await.map_err(engine_err)?;
                Ok(rows_response(USER_COLUMNS, vec![user_row(&user)]))
            }
            Command::SelectBookings => {
                session.authorize(&[Role::Admin, Role::Hod], "list all bookings")?;
                let bookings = engine.list_bookings(BookingFilter::All).await;
                Ok(rows_response(
                    BOOKING_COLUMNS,
                    bookings.iter().map(booking_row).collect(),
                ))
            }
            Command::SelectMyBookings => {
                let user = session.authorize(&[], "list bookings")?;
                let bookings = engine.list_bookings(BookingFilter::Teacher(user.id)).await;
                Ok(rows_response(
                    BOOKING_COLUMNS,
                    bookings.iter().map(booking_row).collect(),
                ))
            }
            Command::SelectRooms => {
                let rooms = engine.list_rooms().await;
                Ok(rows_response(ROOM_COLUMNS, rooms.iter().map(room_row).collect()))
            }
            Command::SelectTimetable { room } => {
                let entries = engine.timetable(&room).await.map_err(engine_err)?;
                Ok(rows_response(
                    TIMETABLE_COLUMNS,
                    entries.iter().map(|e| timetable_row(&room, e)).collect(),
                ))
            }
            Command::SelectAvailability { room, day, date } => {
                let slots = engine
                    .free_slots(&room, day, date)
                    .await
                    .map_err(engine_err)?;
                let rows = slots
                    .iter()
                    .map(|s| {
                        vec![
                            Some(room.clone()),
                            Some(day.as_str().to_string()),
                            Some(s.start_label()),
                            Some(s.end_label()),
                        ]
                    })
                    .collect();
                Ok(rows_response(SLOT_COLUMNS, rows))
            }
            Command::SelectAvailableRooms { day } => {
                let rooms = engine.available_rooms(day).await;
                let rows = rooms
                    .iter()
                    .map(|a| {
                        let mut row = room_row(&a.room);
                        row.push(Some(slot_list(&a.slots)));
                        row
                    })
                    .collect();
                Ok(rows_response(AVAILABLE_ROOM_COLUMNS, rows))
            }
            Command::SelectAvailableWeek { room } => {
                let week = engine.available_week(&room).await.map_err(engine_err)?;
                let rows = week
                    .iter()
                    .map(|(day, slots)| {
                        vec![
                            Some(room.clone()),
                            Some(day.as_str().to_string()),
                            Some(slot_list(slots)),
                        ]
                    })
                    .collect();
                Ok(rows_response(WEEK_COLUMNS, rows))
            }
            Command::SelectFaculty => {
                let faculty = engine.list_faculty();
                let rows = faculty
                    .iter()
                    .map(|f| vec![Some(f.name.clone()), Some(f.role.as_str().to_string())])
                    .collect();
                Ok(rows_response(FACULTY_COLUMNS, rows))
            }
        }
    }
}

// ── Row encoding ─────────────────────────────────────────────────

fn schema(columns: &[&str]) -> Vec<FieldInfo> {
    columns
        .iter()
        .map(|name| {
            FieldInfo::new(
                (*name).into(),
                None,
                None,
                Type::VARCHAR,
                FieldFormat::Text,
            )
        })
        .collect()
}

fn rows_response(columns: &[&str], rows: Vec<Row>) -> Response {
    let schema = Arc::new(schema(columns));
    let encoded: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|row| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            for value in &row {
                encoder.encode_field(value)?;
            }
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(encoded)))
}

fn booking_row(b: &Booking) -> Row {
    vec![
        Some(b.id.to_string()),
        Some(b.teacher.name.clone()),
        Some(b.teacher.email.clone()),
        Some(b.room.clone()),
        Some(b.date.to_string()),
        Some(b.day.as_str().to_string()),
        Some(b.time_slot()),
        Some(b.purpose.clone()),
        Some(b.admin_status.as_str().to_string()),
        Some(b.hod_status.as_str().to_string()),
        b.approval_status().map(|s| s.as_str().to_string()),
    ]
}

fn room_row(r: &RoomInfo) -> Row {
    vec![
        Some(r.name.clone()),
        Some(r.kind.as_str().to_string()),
        Some(r.capacity.to_string()),
        Some(r.location.clone()),
    ]
}

fn timetable_row(room: &str, e: &ScheduleEntry) -> Row {
    vec![
        Some(e.id.to_string()),
        Some(room.to_string()),
        Some(e.day.as_str().to_string()),
        Some(e.time.start_label()),
        Some(e.time.end_label()),
        Some(e.subject.clone()),
        Some(e.faculty.join(", ")),
        e.class.as_ref().map(|c| c.year.clone()),
        e.class.as_ref().map(|c| c.division.clone()),
        e.date.map(|d| d.to_string()),
        Some(e.approval.as_str().to_string()),
    ]
}

fn user_row(u: &User) -> Row {
    vec![
        Some(u.id.to_string()),
        Some(u.name.clone()),
        Some(u.email.clone()),
        Some(u.role.as_str().to_string()),
    ]
}

fn slot_list(slots: &[TimeRange]) -> String {
    slots
        .iter()
        .map(TimeRange::slot_label)
        .collect::<Vec<_>>()
        .join(",")
}

/// Result columns a statement produces, derived from its verb and table.
fn result_columns(sql: &str) -> &'static [&'static str] {
    match sql::statement_target(sql) {
        Ok((StatementKind::Select, table)) => match table.as_str() {
            "bookings" | "my_bookings" => BOOKING_COLUMNS,
            "rooms" => ROOM_COLUMNS,
            "timetable" => TIMETABLE_COLUMNS,
            "availability" => SLOT_COLUMNS,
            "available_rooms" => AVAILABLE_ROOM_COLUMNS,
            "available_week" => WEEK_COLUMNS,
            "faculty" => FACULTY_COLUMNS,
            _ => &[],
        },
        Ok((StatementKind::Insert, table)) => match table.as_str() {
            "bookings" | "admin_decisions" | "hod_decisions" => BOOKING_COLUMNS,
            "timetable" | "timetable_edits" => TIMETABLE_COLUMNS,
            "users" => USER_COLUMNS,
            _ => &[],
        },
        Ok((StatementKind::Delete, _)) | Err(_) => &[],
    }
}

#[async_trait]
impl SimpleQueryHandler for RoomSlotHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let session = self.resolve_session(client).await?;
        Ok(vec![self.run(&session, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RoomSlotQueryParser;

#[async_trait]
impl QueryParser for RoomSlotQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema(result_columns(stmt)))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RoomSlotHandler {
    type Statement = String;
    type QueryParser = RoomSlotQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let session = self.resolve_session(client).await?;
        let sql = substitute_params(&portal.statement.statement, &portal.parameters);
        self.run(&session, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema(result_columns(&target.statement)),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema(result_columns(
            &target.statement.statement,
        ))))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_literal = !in_literal;
            i += 1;
        } else if bytes[i] == b'$' && !in_literal {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
/// The SQL is scanned once; bound values and quoted literals are copied through
/// untouched, so a `$N` inside either is never expanded.
fn substitute_params(sql: &str, params: &[Option<bytes::Bytes>]) -> String {
    let bytes = sql.as_bytes();
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                in_literal = !in_literal;
                i += 1;
            }
            b'$' if !in_literal => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let param = sql[start..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| params.get(idx));
                if let Some(param) = param {
                    result.push_str(&sql[copied..i]);
                    match param {
                        Some(value) => {
                            let text = String::from_utf8_lossy(value);
                            result.push('\'');
                            result.push_str(&text.replace('\'', "''"));
                            result.push('\'');
                        }
                        None => result.push_str("NULL"),
                    }
                    copied = end;
                }
                i = end.max(start);
            }
            _ => i += 1,
        }
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RoomSlotFactory {
    handler: Arc<RoomSlotHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<RoomSlotAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl RoomSlotFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = RoomSlotAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RoomSlotHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RoomSlotFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(RoomSlotFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

fn engine_sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_)
        | EngineError::InvalidTimeSlot(_)
        | EngineError::PastDate(_)
        | EngineError::NotInDirectory(_)
        | EngineError::LimitExceeded(_) => "22023",
        EngineError::SlotConflict(_)
        | EngineError::TimetableConflict(_)
        | EngineError::RoomExists(_)
        | EngineError::UserExists(_) => "23505",
        EngineError::AlreadyProcessed { .. }
        | EngineError::NotYetApproved(_)
        | EngineError::NotEditable(_) => "55000",
        EngineError::RoomNotFound(_)
        | EngineError::BookingNotFound(_)
        | EngineError::EntryNotFound(_) => "02000",
        EngineError::WalError(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    if let EngineError::WalError(_) = &e {
        warn!("storage failure: {e}");
    }
    user_error(engine_sqlstate(&e), e.to_string())
}

fn auth_err(e: AuthError) -> PgWireError {
    let code = match e {
        AuthError::NotRegistered(_) => "28000",
        AuthError::Forbidden { .. } => "42501",
    };
    user_error(code, e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    let code = match e {
        SqlError::BadValue { .. } => "22023",
        SqlError::UnknownTable(_) => "42P01",
        _ => "42601",
    };
    user_error(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn count_params_finds_highest_index() {
        assert_eq!(count_params("SELECT * FROM rooms"), 0);
        assert_eq!(
            count_params("INSERT INTO bookings VALUES ($1, $2, $3, $4, $5)"),
            5
        );
        assert_eq!(count_params("SELECT * FROM availability WHERE day = $2 AND room = $1"), 2);
        assert_eq!(count_params("INSERT INTO bookings VALUES ($1, 'Pay $9')"), 1);
    }

    #[test]
    fn substitute_params_quotes_and_escapes() {
        let sql = "INSERT INTO bookings VALUES ($1, $2, $3, $4, $5)";
        let params = vec![
            Some(Bytes::from_static(b"Lab1")),
            Some(Bytes::from_static(b"2026-10-21")),
            Some(Bytes::from_static(b"Wednesday")),
            Some(Bytes::from_static(b"10:00-10:30")),
            Some(Bytes::from_static(b"Teacher's makeup")),
        ];
        assert_eq!(
            substitute_params(sql, &params),
            "INSERT INTO bookings VALUES ('Lab1', '2026-10-21', 'Wednesday', '10:00-10:30', 'Teacher''s makeup')"
        );
    }

    #[test]
    fn substitute_params_handles_double_digits_and_null() {
        let mut params: Vec<Option<Bytes>> = (1..=10)
            .map(|i| Some(Bytes::from(i.to_string())))
            .collect();
        params[0] = None;
        assert_eq!(substitute_params("$1 $10", &params), "NULL '10'");
    }

    #[test]
    fn substitute_params_never_expands_inside_values() {
        let sql = "INSERT INTO bookings VALUES ($1, $2, $3, $4, $5)";
        let params = vec![
            Some(Bytes::from_static(b"Lab1")),
            Some(Bytes::from_static(b"2026-10-21")),
            Some(Bytes::from_static(b"Wednesday")),
            Some(Bytes::from_static(b"10:00-10:30")),
            Some(Bytes::from_static(b"Pay $1 fee, see $5")),
        ];
        let substituted = substitute_params(sql, &params);
        assert_eq!(
            substituted,
            "INSERT INTO bookings VALUES ('Lab1', '2026-10-21', 'Wednesday', '10:00-10:30', 'Pay $1 fee, see $5')"
        );
        match crate::sql::parse_sql(&substituted).unwrap() {
            Command::InsertBooking { purpose, .. } => assert_eq!(purpose, "Pay $1 fee, see $5"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn substitute_params_skips_quoted_literals_and_unbound_indexes() {
        let params = vec![None, Some(Bytes::from_static(b"Lab1"))];
        assert_eq!(
            substitute_params("SELECT '$1', $2, $1, $3, $", &params),
            "SELECT '$1', 'Lab1', NULL, $3, $"
        );
        assert_eq!(substitute_params("a$1", &[None]), "aNULL");
    }

    #[test]
    fn result_columns_follow_statement_target() {
        assert_eq!(result_columns("SELECT * FROM my_bookings"), BOOKING_COLUMNS);
        assert_eq!(
            result_columns("INSERT INTO hod_decisions VALUES ($1, $2)"),
            BOOKING_COLUMNS
        );
        assert_eq!(
            result_columns("SELECT * FROM availability WHERE room = $1 AND day = $2"),
            SLOT_COLUMNS
        );
        assert!(result_columns("INSERT INTO rooms VALUES ($1, $2, $3)").is_empty());
        assert!(result_columns("DELETE FROM timetable WHERE id = $1").is_empty());
        assert!(result_columns("garbage").is_empty());
    }

    #[test]
    fn sqlstate_mapping() {
        assert_eq!(engine_sqlstate(&EngineError::SlotConflict(ulid::Ulid::new())), "23505");
        assert_eq!(engine_sqlstate(&EngineError::NotYetApproved(ulid::Ulid::new())), "55000");
        assert_eq!(engine_sqlstate(&EngineError::RoomNotFound("x".into())), "02000");
        assert_eq!(engine_sqlstate(&EngineError::InvalidTimeSlot("x".into())), "22023");
        assert_eq!(engine_sqlstate(&EngineError::WalError("disk".into())), "58030");
    }
}
