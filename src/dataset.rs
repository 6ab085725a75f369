//! CSV table loading, the explicit table cache, and atomic CSV output.

use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

// ============================================================================
// Table
// ============================================================================

/// A header row plus data rows, every row exactly as wide as the header.
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    skipped: usize,
}

impl Table {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(&path.display().to_string(), file)
    }

    /// Parse CSV from any reader. Rows whose field count disagrees with the
    /// header are logged and skipped. Invalid UTF-8 is replaced, not fatal.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        let mut rows = Vec::new();
        let mut skipped = 0;
        for (i, record) in csv_reader.byte_records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                warn!(
                    "{}: skipping data row {} ({} fields, header has {})",
                    name,
                    i + 1,
                    record.len(),
                    headers.len()
                );
                skipped += 1;
                continue;
            }
            rows.push(
                record
                    .iter()
                    .map(|cell| String::from_utf8_lossy(cell).into_owned())
                    .collect(),
            );
        }

        debug!("{}: loaded {} rows ({} skipped)", name, rows.len(), skipped);
        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
            skipped,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped at load time for a field-count mismatch.
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// First alias present in the header row.
    pub fn resolve(&self, aliases: &[String]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.column_index(alias))
    }
}

// ============================================================================
// Table Cache
// ============================================================================

/// Loaded tables keyed by path. Nothing is evicted implicitly; callers
/// invalidate a path or clear the cache when the files change underneath.
#[derive(Default)]
pub struct TableCache {
    tables: FxHashMap<PathBuf, Arc<Table>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.get(path) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(Table::load(path)?);
        self.tables.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    /// Drop one cached table. Returns whether it was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.tables.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

// ============================================================================
// Atomic Output
// ============================================================================

/// Write through a temp file next to `path`, then rename over it. A failed
/// write leaves any previous output untouched.
fn replace_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    if let Err(e) = write(&tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<File>) -> Result<()>,
{
    replace_atomically(path, |tmp_path| {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(tmp_path)?;
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    })
}

/// Pretty-printed JSON, replaced atomically like the CSV outputs.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    replace_atomically(path, |tmp_path| {
        let mut writer = BufWriter::new(File::create(tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    })
}

/// Serialize rows under an explicit header. The header is written even when
/// there are no rows.
pub fn write_csv<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    write_atomic(path, |writer| {
        writer.write_record(headers)?;
        for row in rows {
            writer.serialize(row)?;
        }
        Ok(())
    })
}

/// Write a table of plain string cells.
pub fn write_table(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    write_atomic(path, |writer| {
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_reader_skips_ragged_rows() {
        let data = "Name,City\nAcme,Denver\nBroken\nBeta,Boise,Extra\nGamma,\n";
        let table = Table::from_reader("roster", data.as_bytes()).unwrap();
        assert_eq!(table.headers(), &["Name".to_string(), "City".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.skipped_rows(), 2);
        assert_eq!(table.rows()[1], vec!["Gamma".to_string(), String::new()]);
    }

    #[test]
    fn test_resolve_aliases_in_order() {
        let table = Table::from_reader("ref", "npi,City\n1,Denver\n".as_bytes()).unwrap();
        let aliases = vec!["NPI".to_string(), "npi".to_string()];
        assert_eq!(table.resolve(&aliases), Some(0));
        assert_eq!(table.resolve(&["state".to_string()]), None);
    }

    #[test]
    fn test_cache_load_invalidate_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ref.csv");
        fs::write(&path, "A\n1\n").unwrap();

        let mut cache = TableCache::new();
        let first = cache.get_or_load(&path).unwrap();
        assert_eq!(first.len(), 1);

        // Cached copy is served until invalidated
        fs::write(&path, "A\n1\n2\n").unwrap();
        assert_eq!(cache.get_or_load(&path).unwrap().len(), 1);
        assert!(cache.invalidate(&path));
        assert_eq!(cache.get_or_load(&path).unwrap().len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.invalidate(&path));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut cache = TableCache::new();
        let result = cache.get_or_load(Path::new("/nonexistent/ref.csv"));
        assert!(matches!(result, Err(crate::error::ReconcileError::Io(_))));
    }

    #[test]
    fn test_write_csv_atomic_with_header() {
        #[derive(Serialize)]
        struct Row {
            name: String,
            score: u8,
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("match_report.csv");
        let rows = vec![Row {
            name: "Acme, Inc".to_string(),
            score: 100,
        }];
        write_csv(&path, &["Name", "Score"], &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Name,Score\n\"Acme, Inc\",100\n"
        );
        assert!(!path.with_file_name("match_report.csv.tmp").exists());

        let empty: Vec<Row> = Vec::new();
        write_csv(&path, &["Name", "Score"], &empty).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Name,Score\n");
    }

    #[test]
    fn test_write_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("enriched.csv");
        let headers = vec!["A".to_string(), "B".to_string()];
        write_table(&path, &headers, &[vec!["1".to_string(), String::new()]]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A,B\n1,\n");
    }

    #[test]
    fn test_write_json_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        fs::write(&path, "stale").unwrap();
        write_json(&path, &serde_json::json!({ "total_records": 3 })).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"total_records\": 3\n}\n");
        assert!(!path.with_file_name("summary.json.tmp").exists());
    }
}
