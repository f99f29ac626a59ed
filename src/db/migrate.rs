use rusqlite::{params, Connection};
use crate::error::{Result, RelfinderError};

/// Schema migrations compiled into the binary, in version order.
const MIGRATIONS: &[(u32, &str, &str)] = &[(
    1,
    "001_graph_tables",
    include_str!("../../migrations/001_graph_tables.sql"),
)];

/// Tables the relation store cannot work without.
pub const REQUIRED_TABLES: &[&str] = &["entity_relations", "graph_nodes", "schema_migrations"];

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Names of applied migrations, oldest first
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(RelfinderError::Database)?;
    Ok(names)
}

/// Apply every migration not yet recorded in `schema_migrations`.
pub fn run_migrations(conn: &mut Connection) -> Result<usize> {
    ensure_migrations_table(conn)?;
    let applied = get_applied_migrations(conn)?;
    let mut count = 0;

    for (version, name, sql) in MIGRATIONS {
        if applied.iter().any(|a| a == name) {
            log::debug!("Migration {} already applied, skipping", name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", name, version);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![version, name],
        )?;
        tx.commit()?;
        count += 1;
    }

    Ok(count)
}

/// Fail when one of [`REQUIRED_TABLES`] is missing.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|t| !tables.iter().any(|name| name == t))
        .collect();

    if !missing.is_empty() {
        return Err(RelfinderError::Schema(format!(
            "Missing tables: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
