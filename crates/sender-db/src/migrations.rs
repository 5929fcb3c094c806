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
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                       TEXT PRIMARY KEY,
                email                    TEXT NOT NULL UNIQUE,
                username                 TEXT NOT NULL UNIQUE,
                password_hash            TEXT NOT NULL,
                role                     TEXT NOT NULL DEFAULT 'user',
                subscription_plan        TEXT NOT NULL DEFAULT 'free',
                is_unlimited             INTEGER NOT NULL DEFAULT 0,
                messages_sent_this_month INTEGER NOT NULL DEFAULT 0,
                token_epoch              INTEGER NOT NULL DEFAULT 0,
                created_at               TEXT NOT NULL,
                updated_at               TEXT NOT NULL
            );

            CREATE INDEX idx_users_role ON users(role);

            CREATE TABLE messenger_accounts (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                messenger_type  TEXT NOT NULL,
                account_name    TEXT NOT NULL,
                session_data    TEXT NOT NULL DEFAULT '{}',
                is_active       INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messenger_accounts_user
                ON messenger_accounts(user_id, created_at);

            CREATE TABLE templates (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_templates_user ON templates(user_id, created_at);

            CREATE TABLE contacts (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL REFERENCES users(id),
                name                TEXT NOT NULL,
                phone               TEXT,
                telegram_username   TEXT,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_contacts_user ON contacts(user_id, created_at);

            CREATE TABLE broadcast_logs (
                id                TEXT PRIMARY KEY,
                user_id           TEXT NOT NULL REFERENCES users(id),
                messenger_type    TEXT NOT NULL,
                total_contacts    INTEGER NOT NULL,
                successful_sends  INTEGER NOT NULL DEFAULT 0,
                failed_sends      INTEGER NOT NULL DEFAULT 0,
                status            TEXT NOT NULL DEFAULT 'pending',
                created_at        TEXT NOT NULL,
                completed_at      TEXT
            );

            CREATE INDEX idx_broadcast_logs_user ON broadcast_logs(user_id, created_at);

            CREATE TABLE subscription_plans (
                id             TEXT PRIMARY KEY,
                name           TEXT NOT NULL,
                message_limit  INTEGER NOT NULL,
                price          INTEGER NOT NULL,
                version        INTEGER NOT NULL DEFAULT 0
            );

            -- Seed the plan catalogue
            INSERT OR IGNORE INTO subscription_plans (id, name, message_limit, price) VALUES
                ('free',         'Бесплатный',       10,    0),
                ('basic',        'Базовый',          1000,  999),
                ('professional', 'Профессиональный', 5000,  2999),
                ('corporate',    'Корпоративный',    20000, 9999),
                ('unlimited',    'Безлимитный',      -1,    0);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
