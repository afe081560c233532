use anyhow::Context;
use rusqlite::Connection;

const APPOINTMENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_phone TEXT NOT NULL,
    user_name TEXT NOT NULL DEFAULT '',
    purpose TEXT NOT NULL DEFAULT '',
    start_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'scheduled' CHECK (status IN ('scheduled', 'cancelled')),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_appointments_phone_status ON appointments (user_phone, status);
CREATE INDEX IF NOT EXISTS idx_appointments_start_status ON appointments (start_time, status);
";

/// Creates the appointments table if it is absent. There is no versioned
/// migration history; the statement is idempotent.
pub fn ensure_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(APPOINTMENTS_TABLE)
        .context("failed to create appointments table")?;

    tracing::debug!("appointments schema ready");
    Ok(())
}
