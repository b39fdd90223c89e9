use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, so no migration table is needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Users, sessions and private chat log

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    email TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE sessions (
    session_key TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    expires_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE chat (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    msg_from TEXT NOT NULL,
    msg_to TEXT NOT NULL,
    msg TEXT NOT NULL,
    sent_at TEXT NOT NULL,
    FOREIGN KEY (msg_from) REFERENCES users(id),
    FOREIGN KEY (msg_to) REFERENCES users(id)
);

CREATE INDEX idx_chat_pair ON chat(msg_from, msg_to, sent_at);
",
        ),
    ])
}
