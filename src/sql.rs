use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input. INSERT values are positional, in the
/// column order each table documents.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// `rooms (name, type, capacity[, location])`
    InsertRoom {
        name: String,
        kind: RoomKind,
        capacity: u32,
        location: Option<String>,
    },
    /// `timetable (room, day, start_time, end_time, subject, faculty[, year, division])`
    InsertTimetableEntry {
        room: String,
        day: Day,
        start_time: String,
        end_time: String,
        subject: String,
        faculty: Vec<String>,
        class: Option<ClassGroup>,
    },
    /// `timetable_edits (id, subject, faculty)`
    EditTimetableEntry {
        id: Ulid,
        subject: String,
        faculty: Vec<String>,
    },
    DeleteTimetableEntry {
        id: Ulid,
    },
    /// `bookings (room, date, day, time_slot, purpose)`
    InsertBooking {
        room: String,
        date: NaiveDate,
        day: Day,
        time_slot: String,
        purpose: String,
    },
    /// `admin_decisions (booking_id, decision)`
    AdminDecision {
        booking_id: Ulid,
        decision: AdminDecision,
    },
    /// `hod_decisions (booking_id, decision)`
    HodDecision {
        booking_id: Ulid,
        decision: HodDecision,
    },
    /// `faculty (name, role)`
    InsertFaculty {
        name: String,
        role: Role,
    },
    /// `users (name, email)`
    RegisterUser {
        name: String,
        email: String,
    },
    SelectBookings,
    SelectMyBookings,
    SelectRooms,
    SelectTimetable {
        room: String,
    },
    SelectAvailability {
        room: String,
        day: Day,
        date: Option<NaiveDate>,
    },
    SelectAvailableRooms {
        day: Day,
    },
    SelectAvailableWeek {
        room: String,
    },
    SelectFaculty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Delete,
    Select,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    match &parse_one(sql)? {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Statement kind and target table without interpreting any values.
/// Placeholders (`$1`) are fine here, so this works on unbound prepared statements.
pub fn statement_target(sql: &str) -> Result<(StatementKind, String), SqlError> {
    match &parse_one(sql)? {
        Statement::Insert(insert) => Ok((StatementKind::Insert, insert_table_name(insert)?)),
        Statement::Delete(delete) => Ok((StatementKind::Delete, delete_table_name(delete)?)),
        Statement::Query(query) => Ok((StatementKind::Select, select_table_name(query)?.0)),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_one(sql: &str) -> Result<Statement, SqlError> {
    let dialect = PostgreSqlDialect {};
    let mut stmts =
        Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }
    Ok(stmts.remove(0))
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;
    let arity = |name: &'static str, min: usize, max: usize| {
        if values.len() < min || values.len() > max {
            Err(SqlError::WrongArity(name, min, values.len()))
        } else {
            Ok(())
        }
    };

    match table.as_str() {
        "rooms" => {
            arity("rooms", 3, 4)?;
            Ok(Command::InsertRoom {
                name: parse_text(&values[0])?,
                kind: parse_keyword(&values[1], "type", RoomKind::parse)?,
                capacity: parse_u32(&values[2])?,
                location: values.get(3).map(parse_text_or_null).transpose()?.flatten(),
            })
        }
        "timetable" => {
            arity("timetable", 6, 8)?;
            let class = match (values.get(6), values.get(7)) {
                (Some(year), Some(division)) => {
                    match (parse_text_or_null(year)?, parse_text_or_null(division)?) {
                        (Some(year), Some(division)) => Some(ClassGroup { year, division }),
                        _ => None,
                    }
                }
                _ => None,
            };
            Ok(Command::InsertTimetableEntry {
                room: parse_text(&values[0])?,
                day: parse_keyword(&values[1], "day", Day::parse)?,
                start_time: parse_text(&values[2])?,
                end_time: parse_text(&values[3])?,
                subject: parse_text(&values[4])?,
                faculty: parse_name_list(&values[5])?,
                class,
            })
        }
        "timetable_edits" => {
            arity("timetable_edits", 3, 3)?;
            Ok(Command::EditTimetableEntry {
                id: parse_ulid(&values[0])?,
                subject: parse_text(&values[1])?,
                faculty: parse_name_list(&values[2])?,
            })
        }
        "bookings" => {
            arity("bookings", 5, 5)?;
            Ok(Command::InsertBooking {
                room: parse_text(&values[0])?,
                date: parse_date(&values[1])?,
                day: parse_keyword(&values[2], "day", Day::parse)?,
                time_slot: parse_text(&values[3])?,
                purpose: parse_text(&values[4])?,
            })
        }
        "admin_decisions" => {
            arity("admin_decisions", 2, 2)?;
            Ok(Command::AdminDecision {
                booking_id: parse_ulid(&values[0])?,
                decision: parse_keyword(&values[1], "decision", AdminDecision::parse)?,
            })
        }
        "hod_decisions" => {
            arity("hod_decisions", 2, 2)?;
            Ok(Command::HodDecision {
                booking_id: parse_ulid(&values[0])?,
                decision: parse_keyword(&values[1], "decision", HodDecision::parse)?,
            })
        }
        "faculty" => {
            arity("faculty", 2, 2)?;
            Ok(Command::InsertFaculty {
                name: parse_text(&values[0])?,
                role: parse_keyword(&values[1], "role", Role::parse)?,
            })
        }
        "users" => {
            arity("users", 2, 2)?;
            Ok(Command::RegisterUser {
                name: parse_text(&values[0])?,
                email: parse_text(&values[1])?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    match table.as_str() {
        "timetable" => {
            let filters = collect_filters(delete.selection.as_ref());
            Ok(Command::DeleteTimetableEntry {
                id: parse_ulid(required(&filters, "id")?)?,
            })
        }
        _ => Err(SqlError::Unsupported(format!("DELETE FROM {table}"))),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let (table, selection) = select_table_name(query)?;
    let filters = collect_filters(selection);

    match table.as_str() {
        "bookings" => Ok(Command::SelectBookings),
        "my_bookings" => Ok(Command::SelectMyBookings),
        "rooms" => Ok(Command::SelectRooms),
        "faculty" => Ok(Command::SelectFaculty),
        "timetable" => Ok(Command::SelectTimetable {
            room: parse_text(required(&filters, "room")?)?,
        }),
        "availability" => Ok(Command::SelectAvailability {
            room: parse_text(required(&filters, "room")?)?,
            day: parse_keyword(required(&filters, "day")?, "day", Day::parse)?,
            date: optional(&filters, "date").map(parse_date).transpose()?,
        }),
        "available_rooms" => Ok(Command::SelectAvailableRooms {
            day: parse_keyword(required(&filters, "day")?, "day", Day::parse)?,
        }),
        "available_week" => Ok(Command::SelectAvailableWeek {
            room: parse_text(required(&filters, "room")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = x AND b = y` into column/value pairs. Other predicates are ignored.
fn collect_filters(selection: Option<&Expr>) -> Vec<(String, &Expr)> {
    fn walk<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) {
        match expr {
            Expr::Nested(inner) => walk(inner, out),
            Expr::BinaryOp { left, op, right } => match op {
                ast::BinaryOperator::And => {
                    walk(left, out);
                    walk(right, out);
                }
                ast::BinaryOperator::Eq => {
                    if let Some(col) = expr_column_name(left) {
                        out.push((col, right));
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    let mut out = Vec::new();
    if let Some(expr) = selection {
        walk(expr, &mut out);
    }
    out
}

fn optional<'a>(filters: &[(String, &'a Expr)], col: &str) -> Option<&'a Expr> {
    filters.iter().find(|(c, _)| c == col).map(|(_, e)| *e)
}

fn required<'a>(filters: &[(String, &'a Expr)], col: &'static str) -> Result<&'a Expr, SqlError> {
    optional(filters, col).ok_or(SqlError::MissingFilter(col))
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn select_table_name(query: &ast::Query) -> Result<(String, Option<&Expr>), SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let first = select
        .from
        .first()
        .ok_or_else(|| SqlError::Parse("SELECT without FROM".into()))?;
    Ok((table_factor_name(&first.relation)?, select.selection.as_ref()))
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.as_slice()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

/// Strings and bare numbers both read as text (room `64` needs no quotes).
fn parse_text_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s) | Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    parse_text_or_null(expr)?.ok_or_else(|| SqlError::Parse("unexpected NULL".into()))
}

fn parse_keyword<T>(
    expr: &Expr,
    column: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, SqlError> {
    let raw = parse_text(expr)?;
    parse(&raw).ok_or(SqlError::BadValue { column, value: raw })
}

/// Comma-separated names, e.g. `'Ms. Neha Katre (NK), Prasad Sir'`.
fn parse_name_list(expr: &Expr) -> Result<Vec<String>, SqlError> {
    Ok(parse_text(expr)?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let raw = parse_text(expr)?;
    Ulid::from_string(raw.trim()).map_err(|e| SqlError::Parse(format!("bad ULID {raw}: {e}")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let raw = parse_text(expr)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| SqlError::BadValue { column: "date", value: raw })
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let raw = parse_text(expr)?;
    raw.trim()
        .parse()
        .map_err(|_| SqlError::Parse(format!("{raw} is not a non-negative integer")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    BadValue { column: &'static str, value: String },
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected at least {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadValue { column, value } => write!(f, "invalid {column}: {value:?}"),
        }
    }
}

impl std::error::Error for SqlError {}
