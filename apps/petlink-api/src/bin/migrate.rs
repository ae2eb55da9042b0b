//! Applies the embedded schema migrations to `DATABASE_URL`.
//!
//! Usage:
//!   cargo run -p petlink-api --bin petlink-migrate

use std::path::Path;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    let database_url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.is_empty())
        .expect("DATABASE_URL env var is required to run migrations");

    let mut conn =
        PgConnection::establish(&database_url).expect("failed to connect to database");

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");

    if applied.is_empty() {
        println!("Schema is up to date.");
        return;
    }
    for migration in &applied {
        println!("  applied {migration}");
    }
    println!("{} migration(s) applied.", applied.len());
}
