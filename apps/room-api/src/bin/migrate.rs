//! Applies the embedded room-api migrations.
//!
//! Usage:
//!   cargo run -p room-api --bin room-migrate
//!   cargo run -p room-api --bin room-migrate -- --test
//!
//! `--test` targets the `<db>_test` database next to DATABASE_URL.

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let Ok(mut database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is required to run migrations");
        std::process::exit(2);
    };

    if std::env::args().skip(1).any(|arg| arg == "--test") {
        database_url = with_test_db_suffix(&database_url);
    }

    let mut conn = match PgConnection::establish(&database_url) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("could not connect to database: {err}");
            std::process::exit(1);
        }
    };

    let applied = match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => applied,
        Err(err) => {
            eprintln!("migration failed: {err}");
            std::process::exit(1);
        }
    };

    if applied.is_empty() {
        println!("Schema is up to date.");
    } else {
        for version in &applied {
            println!("  applied {version}");
        }
        println!("{} migration(s) applied.", applied.len());
    }
}

/// `postgres://host/flickpick?x=y` → `postgres://host/flickpick_test?x=y`.
fn with_test_db_suffix(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };
    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    let mut updated = format!("{prefix}/{db_name}_test");
    if let Some(query) = query {
        updated.push('?');
        updated.push_str(query);
    }
    updated
}
