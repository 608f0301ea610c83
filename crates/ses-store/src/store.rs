use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, params};
use uuid::Uuid;

use ses_core::SessionSummary;

use crate::error::Result;
use crate::schema;

/// A session summary as stored locally, with its assigned id and arrival
/// timestamp.
#[derive(Clone, Debug)]
pub struct StoredSession {
    pub id: Uuid,
    pub summary: SessionSummary,
    pub received_at: u64,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a completed session, assigning it a fresh id. Returns the id.
    pub fn insert_session(&self, summary: &SessionSummary) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let received_at = now_unix_secs();
        self.conn.execute(
            "INSERT INTO sessions (id, name, matric_id, course, module, student_group,
                                   engaged_percentage, total_frames, disengaged_seconds,
                                   session_seconds, fps, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id.to_string(),
                summary.name,
                summary.matric_id,
                summary.course,
                summary.module,
                summary.group,
                summary.engaged_percentage,
                summary.total_frames as i64,
                summary.disengaged_seconds,
                summary.time,
                summary.fps,
                received_at as i64,
            ],
        )?;
        tracing::debug!("stored session {id} for {}", summary.matric_id);
        Ok(id)
    }

    /// All stored sessions, most recent first.
    pub fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, matric_id, course, module, student_group,
                    engaged_percentage, total_frames, disengaged_seconds,
                    session_seconds, fps, received_at
             FROM sessions ORDER BY received_at DESC, id",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let total_frames: i64 = row.get(7)?;
            let received_at: i64 = row.get(11)?;
            Ok((
                id,
                SessionSummary {
                    name: row.get(1)?,
                    matric_id: row.get(2)?,
                    course: row.get(3)?,
                    module: row.get(4)?,
                    group: row.get(5)?,
                    engaged_percentage: row.get(6)?,
                    total_frames: total_frames as usize,
                    disengaged_seconds: row.get(8)?,
                    time: row.get(9)?,
                    fps: row.get(10)?,
                },
                received_at as u64,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, summary, received_at) = row?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| crate::StoreError::InvalidData(format!("bad session id: {e}")))?;
            sessions.push(StoredSession {
                id,
                summary,
                received_at,
            });
        }
        Ok(sessions)
    }

    pub fn session_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Write every stored session to a fresh CSV file (header plus one row
    /// per session, most recent first). Returns the row count.
    pub fn export_csv(&self, path: &Path) -> Result<u64> {
        let sessions = self.list_sessions()?;
        let mut writer = csv::Writer::from_path(path)?;
        for session in &sessions {
            writer.serialize(&session.summary)?;
        }
        writer.flush()?;
        Ok(sessions.len() as u64)
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
