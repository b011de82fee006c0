use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            role            TEXT NOT NULL,
            kyc_verified    INTEGER NOT NULL DEFAULT 0,
            kyc_pan         TEXT,
            kyc_aadhaar     TEXT,
            kyc_id_proof    TEXT,
            max_amount      REAL,
            interest_rate   REAL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS loans (
            id                  TEXT PRIMARY KEY,
            borrower            TEXT NOT NULL REFERENCES users(id),
            amount              REAL NOT NULL,
            interest_rate       REAL NOT NULL,
            period_months       INTEGER NOT NULL,
            status              TEXT NOT NULL DEFAULT 'open',
            matched_with        TEXT REFERENCES users(id),
            borrower_accepted   INTEGER NOT NULL DEFAULT 0,
            lender_accepted     INTEGER NOT NULL DEFAULT 0,
            version             INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_loans_borrower
            ON loans(borrower);

        CREATE INDEX IF NOT EXISTS idx_loans_matched_with
            ON loans(matched_with);

        CREATE INDEX IF NOT EXISTS idx_loans_status
            ON loans(status);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
