//! SQLite-backed message log and user directory.

use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, OptionalExtension};

use crate::db::{format_timestamp, now_millis, parse_timestamp, DbPool};
use crate::relay::{ChatMessage, Correspondent, Directory, MessageStore, RelayError};

#[derive(Clone)]
pub struct SqliteChatStore {
    db: DbPool,
}

impl SqliteChatStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RelayError> {
        self.db
            .lock()
            .map_err(|_| RelayError::Unavailable("database lock poisoned".to_string()))
    }
}

fn user_id(conn: &Connection, login: &str) -> Result<String, RelayError> {
    conn.query_row(
        "SELECT id FROM users WHERE login = ?1",
        rusqlite::params![login],
        |row| row.get::<_, String>(0),
    )
    .optional()?
    .ok_or_else(|| RelayError::UnknownUser(login.to_string()))
}

fn timestamp_column(text: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    parse_timestamp(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

impl MessageStore for SqliteChatStore {
    fn save(&self, from: &str, to: &str, text: &str) -> Result<DateTime<Utc>, RelayError> {
        let conn = self.lock()?;
        let from_id = user_id(&conn, from)?;
        let to_id = user_id(&conn, to)?;
        let sent_at = now_millis();

        conn.execute(
            "INSERT INTO chat (msg_from, msg_to, msg, sent_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![from_id, to_id, text, format_timestamp(sent_at)],
        )?;

        Ok(sent_at)
    }

    fn query(&self, a: &str, b: &str, skip: u32, limit: u32) -> Result<Vec<ChatMessage>, RelayError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT uf.login, ut.login, c.msg, c.sent_at
             FROM chat c
             JOIN users uf ON c.msg_from = uf.id
             JOIN users ut ON c.msg_to = ut.id
             WHERE (uf.login = ?1 AND ut.login = ?2)
                OR (uf.login = ?2 AND ut.login = ?1)
             ORDER BY c.sent_at DESC, c.id DESC
             LIMIT ?3 OFFSET ?4",
        )?;

        let messages = stmt
            .query_map(rusqlite::params![a, b, limit, skip], |row| {
                let sent_at: String = row.get(3)?;
                Ok(ChatMessage {
                    from: row.get(0)?,
                    to: row.get(1)?,
                    text: row.get(2)?,
                    sent_at: timestamp_column(&sent_at, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }
}

impl Directory for SqliteChatStore {
    fn correspondents(&self, viewer: &str) -> Result<Vec<Correspondent>, RelayError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "WITH viewer AS (SELECT id FROM users WHERE login = ?1)
             SELECT u.login, u.id, MAX(c.sent_at) AS last_at
             FROM users u
             LEFT JOIN chat c
               ON (c.msg_from = u.id AND c.msg_to = (SELECT id FROM viewer))
               OR (c.msg_to = u.id AND c.msg_from = (SELECT id FROM viewer))
             WHERE u.login != ?1
             GROUP BY u.id, u.login
             ORDER BY last_at IS NULL, last_at DESC, lower(u.login) ASC",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![viewer], |row| {
                let last_at: Option<String> = row.get(2)?;
                Ok(Correspondent {
                    login: row.get(0)?,
                    id: row.get(1)?,
                    last_message_at: last_at
                        .map(|text| timestamp_column(&text, 2))
                        .transpose()?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_users(logins: &[&str]) -> (tempfile::TempDir, SqliteChatStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::init_db(dir.path().to_str().unwrap()).unwrap();
        {
            let conn = db.lock().unwrap();
            for login in logins {
                conn.execute(
                    "INSERT INTO users (id, login, email, created_at) VALUES (?1, ?2, NULL, ?3)",
                    rusqlite::params![
                        format!("id-{}", login),
                        login,
                        format_timestamp(Utc::now())
                    ],
                )
                .unwrap();
            }
        }
        (dir, SqliteChatStore::new(db))
    }

    #[test]
    fn test_save_unknown_endpoint() {
        let (_dir, store) = store_with_users(&["bob"]);

        let err = store.save("bob", "zzz", "hi").unwrap_err();
        assert!(matches!(err, RelayError::UnknownUser(ref login) if login == "zzz"));

        let err = store.save("zzz", "bob", "hi").unwrap_err();
        assert!(matches!(err, RelayError::UnknownUser(ref login) if login == "zzz"));

        assert!(store.query("bob", "zzz", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_query_newest_first_both_directions() {
        let (_dir, store) = store_with_users(&["alice", "bob", "carol"]);
        store.save("alice", "bob", "one").unwrap();
        store.save("bob", "alice", "two").unwrap();
        store.save("carol", "alice", "other").unwrap();
        let sent_at = store.save("alice", "bob", "three").unwrap();

        let window = store.query("bob", "alice", 0, 10).unwrap();

        let texts: Vec<_> = window.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["three", "two", "one"]);
        assert_eq!(window[0].sent_at, sent_at);
        assert_eq!(window[1].from, "bob");
        assert_eq!(window[1].to, "alice");
    }

    #[test]
    fn test_query_skip_and_limit() {
        let (_dir, store) = store_with_users(&["alice", "bob"]);
        for i in 0..5 {
            store.save("alice", "bob", &format!("m{}", i)).unwrap();
        }

        let window = store.query("alice", "bob", 1, 2).unwrap();

        let texts: Vec<_> = window.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m2"]);
    }

    #[test]
    fn test_correspondents_ordering() {
        let (_dir, store) = store_with_users(&["alice", "bob", "Carol", "dave", "erin"]);
        store.save("alice", "dave", "first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("erin", "alice", "second").unwrap();
        store.save("bob", "Carol", "not alice").unwrap();

        let rows = store.correspondents("alice").unwrap();

        let logins: Vec<_> = rows.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["erin", "dave", "bob", "Carol"]);
        assert!(rows[0].last_message_at.is_some());
        assert!(rows[2].last_message_at.is_none());
    }

    #[test]
    fn test_correspondents_unknown_viewer_lists_everyone() {
        let (_dir, store) = store_with_users(&["bob", "alice"]);
        let rows = store.correspondents("nobody").unwrap();
        let logins: Vec<_> = rows.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["alice", "bob"]);
    }
}
