// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Migrations run automatically on database open.

use tasklog_core::TasklogError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history` table.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), TasklogError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| TasklogError::Persistence {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::debug!(
            version = migration.version(),
            name = migration.name(),
            "migration applied"
        );
    }
    Ok(())
}

/// Run migrations up to and including `version`.
///
/// Used to stage a database at an older schema, e.g. to exercise the
/// watermark carry-over of later migrations.
pub fn run_migrations_to(
    conn: &mut rusqlite::Connection,
    version: i32,
) -> Result<(), TasklogError> {
    embedded::migrations::runner()
        .set_target(refinery::Target::Version(version))
        .run(conn)
        .map_err(|e| TasklogError::Persistence {
            source: Box::new(e),
        })?;
    Ok(())
}
