//! SQL schema for the Moot SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    email           TEXT NOT NULL UNIQUE,
    username        TEXT NOT NULL UNIQUE,
    display_name    TEXT NOT NULL UNIQUE,
    full_name       TEXT,
    bio             TEXT,
    avatar_url      TEXT,
    website_url     TEXT,
    location        TEXT,
    password_hash   TEXT,            -- NULL for OAuth-only accounts
    github_id       TEXT UNIQUE,
    github_username TEXT,
    is_active       INTEGER NOT NULL DEFAULT 1,
    is_verified     INTEGER NOT NULL DEFAULT 0,
    profile_public  INTEGER NOT NULL DEFAULT 1,
    show_email      INTEGER NOT NULL DEFAULT 0,
    show_real_name  INTEGER NOT NULL DEFAULT 0,
    -- ledger balances; moved only inside the transaction of the write that
    -- causes them, never recomputed from history
    karma_score     INTEGER NOT NULL DEFAULT 0,
    post_count      INTEGER NOT NULL DEFAULT 0,
    comment_count   INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Single-use, expiring; only the SHA-256 of the issued token is stored.
CREATE TABLE IF NOT EXISTS email_verification_tokens (
    token_hash  TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(user_id),
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    used_at     TEXT
);

CREATE TABLE IF NOT EXISTS posts (
    post_id            TEXT PRIMARY KEY,
    author_id          TEXT NOT NULL REFERENCES users(user_id),
    title              TEXT NOT NULL,
    slug               TEXT NOT NULL,
    post_type          TEXT NOT NULL,   -- 'question' | 'discussion' | 'announcement'
    body_markdown      TEXT NOT NULL,
    body_html          TEXT NOT NULL,
    body_text          TEXT NOT NULL,   -- plain text for search
    has_code           INTEGER NOT NULL DEFAULT 0,
    has_images         INTEGER NOT NULL DEFAULT 0,
    upvote_count       INTEGER NOT NULL DEFAULT 0,
    downvote_count     INTEGER NOT NULL DEFAULT 0,
    comment_count      INTEGER NOT NULL DEFAULT 0,
    answer_count       INTEGER NOT NULL DEFAULT 0,
    view_count         INTEGER NOT NULL DEFAULT 0,
    is_answered        INTEGER NOT NULL DEFAULT 0,
    accepted_answer_id TEXT REFERENCES comments(comment_id),
    is_locked          INTEGER NOT NULL DEFAULT 0,
    is_deleted         INTEGER NOT NULL DEFAULT 0,
    is_featured        INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    last_activity      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id     TEXT PRIMARY KEY,
    post_id        TEXT NOT NULL REFERENCES posts(post_id),
    author_id      TEXT NOT NULL REFERENCES users(user_id),
    parent_id      TEXT REFERENCES comments(comment_id),
    body_html      TEXT NOT NULL,
    body_text      TEXT NOT NULL,
    has_code       INTEGER NOT NULL DEFAULT 0,
    has_images     INTEGER NOT NULL DEFAULT 0,
    upvote_count   INTEGER NOT NULL DEFAULT 0,
    downvote_count INTEGER NOT NULL DEFAULT 0,
    reply_count    INTEGER NOT NULL DEFAULT 0,
    is_answer      INTEGER NOT NULL DEFAULT 0,
    is_accepted    INTEGER NOT NULL DEFAULT 0,
    is_deleted     INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    tag_id      TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT,
    post_count  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS post_tags (
    post_id TEXT NOT NULL REFERENCES posts(post_id),
    tag_id  TEXT NOT NULL REFERENCES tags(tag_id),
    PRIMARY KEY (post_id, tag_id)
);

-- One row per (target, user); direction lives in vote_type.
CREATE TABLE IF NOT EXISTS post_votes (
    post_id    TEXT NOT NULL REFERENCES posts(post_id),
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    vote_type  TEXT NOT NULL,   -- 'upvote' | 'downvote'
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (post_id, user_id)
);

CREATE TABLE IF NOT EXISTS comment_votes (
    comment_id TEXT NOT NULL REFERENCES comments(comment_id),
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    vote_type  TEXT NOT NULL,   -- 'upvote' | 'downvote'
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (comment_id, user_id)
);

CREATE TABLE IF NOT EXISTS bookmarks (
    post_id    TEXT NOT NULL REFERENCES posts(post_id),
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (post_id, user_id)
);

CREATE INDEX IF NOT EXISTS posts_author_idx    ON posts(author_id);
CREATE INDEX IF NOT EXISTS posts_created_idx   ON posts(created_at);
CREATE INDEX IF NOT EXISTS posts_activity_idx  ON posts(last_activity);
CREATE INDEX IF NOT EXISTS comments_post_idx   ON comments(post_id);
CREATE INDEX IF NOT EXISTS comments_author_idx ON comments(author_id);
CREATE INDEX IF NOT EXISTS comments_parent_idx ON comments(parent_id);
CREATE INDEX IF NOT EXISTS bookmarks_user_idx  ON bookmarks(user_id);
CREATE INDEX IF NOT EXISTS tokens_user_idx     ON email_verification_tokens(user_id);

PRAGMA user_version = 1;
";
