use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (posts, comments)");
        conn.execute_batch(
            "
            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                author      TEXT NOT NULL,
                is_verified INTEGER NOT NULL DEFAULT 0,
                category    TEXT NOT NULL DEFAULT 'public'
                            CHECK (category IN ('public', 'admin')),
                fingerprint TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_created ON posts(created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author      TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (login throttling)");
        conn.execute_batch(
            "
            CREATE TABLE login_attempts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint     TEXT NOT NULL,
                ip_address      TEXT,
                was_successful  INTEGER NOT NULL,
                attempted_at    TEXT NOT NULL
            );

            CREATE INDEX idx_login_attempts_fp ON login_attempts(fingerprint, attempted_at);

            CREATE TABLE blocked_fingerprints (
                fingerprint     TEXT PRIMARY KEY,
                blocked_until   TEXT NOT NULL,
                reason          TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
