use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Params};

use crate::models::{Appointment, AppointmentStatus, NewAppointment};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str =
    "id, user_phone, user_name, purpose, start_time, status, created_at";

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, new: &NewAppointment) -> anyhow::Result<Appointment> {
    conn.execute(
        "INSERT INTO appointments (user_phone, user_name, purpose, start_time, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.user_phone,
            new.user_name,
            new.purpose,
            format_timestamp(&new.start_time),
            AppointmentStatus::Scheduled.as_str(),
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_appointment(conn, id)?.with_context(|| format!("appointment {id} vanished after insert"))
}

pub fn get_appointment(conn: &Connection, id: i64) -> anyhow::Result<Option<Appointment>> {
    query_first(
        conn,
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id],
    )
}

/// Earliest scheduled appointment for the phone, ties broken by id.
pub fn find_scheduled_for_phone(conn: &Connection, phone: &str) -> anyhow::Result<Option<Appointment>> {
    query_first(
        conn,
        &format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE user_phone = ?1 AND status = ?2
             ORDER BY start_time ASC, id ASC LIMIT 1"
        ),
        params![phone, AppointmentStatus::Scheduled.as_str()],
    )
}

pub fn find_scheduled_at(
    conn: &Connection,
    start_time: &NaiveDateTime,
) -> anyhow::Result<Option<Appointment>> {
    query_first(
        conn,
        &format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE start_time = ?1 AND status = ?2
             ORDER BY id ASC LIMIT 1"
        ),
        params![format_timestamp(start_time), AppointmentStatus::Scheduled.as_str()],
    )
}

pub fn count_scheduled_at(conn: &Connection, start_time: &NaiveDateTime) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE start_time = ?1 AND status = ?2",
        params![format_timestamp(start_time), AppointmentStatus::Scheduled.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_scheduled_for_phone(conn: &Connection, phone: &str) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE user_phone = ?1 AND status = ?2
         ORDER BY start_time ASC, id ASC"
    ))?;

    let rows = stmt.query_map(
        params![phone, AppointmentStatus::Scheduled.as_str()],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn update_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn update_start_time(
    conn: &Connection,
    id: i64,
    start_time: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET start_time = ?1 WHERE id = ?2",
        params![format_timestamp(start_time), id],
    )?;
    Ok(count > 0)
}

// ── Helpers ──

fn query_first<P: Params>(conn: &Connection, sql: &str, params: P) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(sql, params, |row| Ok(parse_appointment_row(row)));

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {raw}"))
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let start_time_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(Appointment {
        id: row.get(0)?,
        user_phone: row.get(1)?,
        user_name: row.get(2)?,
        purpose: row.get(3)?,
        start_time: parse_timestamp(&start_time_str)?,
        status: status_str.parse()?,
        created_at: parse_timestamp(&created_at_str)?,
    })
}
