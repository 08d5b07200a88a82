//! Loads chunks through an embedded DuckDB connection

use super::{
    align_to_target, manifest_insert_sql, manifest_table_sql, quote_identifier, ChunkSource,
    ManifestRow, MaterializeOptions, MaterializeReport, WarehouseError,
};
use crate::catalog::LoadedManifest;
use ::duckdb::{params, Connection};
use tracing::{debug, info};

impl From<::duckdb::Error> for WarehouseError {
    fn from(e: ::duckdb::Error) -> Self {
        WarehouseError::DuckDb(e.to_string())
    }
}

pub(super) fn load(
    sources: &[ChunkSource],
    manifests: &[LoadedManifest],
    options: &MaterializeOptions,
) -> Result<MaterializeReport, WarehouseError> {
    if let Some(parent) = options.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| WarehouseError::IoError(format!("Failed to create {}: {e}", parent.display())))?;
    }
    let conn = Connection::open(&options.database)?;
    let table = quote_identifier(&options.table);

    if options.replace {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
        if let Some(manifest_table) = &options.manifest_table {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_identifier(manifest_table)))?;
        }
    }

    let mut target = if table_exists(&conn, &options.table)? {
        Some(describe(&conn, &format!("SELECT * FROM {table}"))?)
    } else {
        None
    };

    for source in sources {
        let available = describe(&conn, &format!("SELECT * FROM {}", source.reader_sql(options.all_varchar)))?;
        let relation = source.select_sql(&available, options);
        match &target {
            None => {
                conn.execute_batch(&format!("CREATE TABLE {table} AS {relation}"))?;
                target = Some(available);
            }
            Some(columns) => {
                let aligned = align_to_target(&relation, columns, &available, source.path())?;
                conn.execute_batch(&format!("INSERT INTO {table} {aligned}"))?;
            }
        }
        debug!(path = %source.path().display(), "Chunk loaded");
    }

    let table_rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;

    let manifests_loaded = match &options.manifest_table {
        Some(manifest_table) if !manifests.is_empty() => load_manifests(&conn, manifest_table, manifests)?,
        _ => 0,
    };

    info!(
        database = %options.database.display(),
        table = %options.table,
        files = sources.len(),
        rows = table_rows,
        manifests = manifests_loaded,
        "Materialized chunks"
    );

    Ok(MaterializeReport {
        database: options.database.clone(),
        table: options.table.clone(),
        files_loaded: sources.len(),
        files_skipped: 0,
        table_rows: table_rows.max(0) as u64,
        manifests_loaded,
    })
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, WarehouseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM duckdb_tables() WHERE lower(table_name) = lower(?)",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of a query, in order
fn describe(conn: &Connection, query: &str) -> Result<Vec<String>, WarehouseError> {
    let mut stmt = conn.prepare(&format!("DESCRIBE {query}"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn load_manifests(
    conn: &Connection,
    manifest_table: &str,
    manifests: &[LoadedManifest],
) -> Result<usize, WarehouseError> {
    conn.execute_batch(&manifest_table_sql(manifest_table))?;
    let mut insert = conn.prepare(&manifest_insert_sql(manifest_table))?;
    for loaded in manifests {
        let row = ManifestRow::from_loaded(loaded)?;
        insert.execute(params![
            row.data_file,
            row.manifest_path,
            row.manifest_dir,
            row.rows,
            row.sha256,
            row.params,
            row.started_at,
            row.finished_at,
            row.duration_seconds,
            row.endpoint,
            row.version,
            row.chunk,
            row.format,
            row.requested_format,
            row.window_start,
            row.window_end,
        ])?;
    }
    Ok(manifests.len())
}
