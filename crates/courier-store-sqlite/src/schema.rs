//! SQL schema for the Courier SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One pending login code per destination; a new dispatch replaces it.
CREATE TABLE IF NOT EXISTS verification_requests (
    destination TEXT PRIMARY KEY,
    code        TEXT NOT NULL,   -- 6 decimal digits, leading zeros allowed
    expires_at  TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE TABLE IF NOT EXISTS profiles (
    uuid         TEXT PRIMARY KEY,
    destination  TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    picture_id   TEXT,
    contacts     TEXT             -- opaque serialised blob, never inspected
);

CREATE TABLE IF NOT EXISTS chats (
    cuuid      TEXT PRIMARY KEY,
    picture_id TEXT,
    name       TEXT NOT NULL
);

-- Membership is a set; the unique pair constraint is what makes repeated
-- adds harmless.
CREATE TABLE IF NOT EXISTS chat_members (
    cuuid TEXT NOT NULL REFERENCES chats(cuuid),
    uuid  TEXT NOT NULL,
    UNIQUE (cuuid, uuid)
);

-- Append-only message log. No UPDATE or DELETE is ever issued here.
CREATE TABLE IF NOT EXISTS chat_messages (
    cuuid        TEXT NOT NULL REFERENCES chats(cuuid),
    message_type INTEGER NOT NULL,  -- 0 text | 1 chat_update | 2 typing
    content      TEXT NOT NULL,     -- tag-specific encoding
    sent_at      TEXT NOT NULL,     -- RFC 3339 UTC; server-assigned
    sender       TEXT NOT NULL
);

-- Unread markers reference a message by (cuuid, sent_at) rather than a
-- surrogate id, so two messages in one chat within the same timestamp tick
-- conflate.
CREATE TABLE IF NOT EXISTS unread_markers (
    cuuid   TEXT NOT NULL,
    sent_at TEXT NOT NULL,
    uuid    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS chat_members_uuid_idx   ON chat_members(uuid);
CREATE INDEX IF NOT EXISTS chat_messages_chat_idx  ON chat_messages(cuuid, sent_at);
CREATE INDEX IF NOT EXISTS unread_markers_uuid_idx ON unread_markers(uuid);

PRAGMA user_version = 1;
";
