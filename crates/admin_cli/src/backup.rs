//! Zip backups of the SQLite database file.
//!
//! Backups are plain zip archives holding the database file under its own
//! name, named `dompet-backup-YYYYMMDD-HHMMSS.zip` so lexicographic order is
//! chronological order.

use std::{
    collections::BTreeMap,
    error::Error,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use chrono::Local;
use serde::Serialize;
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

const BACKUP_PREFIX: &str = "dompet-backup-";
const BACKUP_SUFFIX: &str = ".zip";
const METADATA_NAME: &str = "metadata.json";

/// Written into each archive next to the database file.
#[derive(Debug, Serialize)]
pub struct BackupMetadata {
    pub created_at: String,
    pub db_size: u64,
    pub table_counts: BTreeMap<String, i64>,
}

pub struct BackupManager {
    db_path: PathBuf,
    backup_dir: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    pub size: u64,
}

impl BackupManager {
    pub fn new(db_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Zips the database file and its metadata into a new timestamped
    /// archive and returns its path.
    pub fn create(
        &self,
        label: Option<&str>,
        table_counts: BTreeMap<String, i64>,
    ) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
        if !self.db_path.is_file() {
            return Err(format!("database file not found: {}", self.db_path.display()).into());
        }
        fs::create_dir_all(&self.backup_dir)?;

        let now = Local::now();
        let stamp = now.format("%Y%m%d-%H%M%S");
        let label = match label {
            Some(label) => format!("-{label}"),
            None => String::new(),
        };
        let archive_path = self
            .backup_dir
            .join(format!("{BACKUP_PREFIX}{stamp}{label}{BACKUP_SUFFIX}"));

        let metadata = BackupMetadata {
            created_at: now.to_rfc3339(),
            db_size: fs::metadata(&self.db_path)?.len(),
            table_counts,
        };

        let mut writer = ZipWriter::new(File::create(&archive_path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(db_file_name(&self.db_path)?, options)?;
        let mut source = File::open(&self.db_path)?;
        io::copy(&mut source, &mut writer)?;
        writer.start_file(METADATA_NAME, options)?;
        serde_json::to_writer_pretty(&mut writer, &metadata)?;
        writer.finish()?;

        Ok(archive_path)
    }

    /// Existing backups, newest first.
    pub fn list(&self) -> Result<Vec<BackupEntry>, Box<dyn Error + Send + Sync>> {
        let mut entries = Vec::new();
        let read_dir = match fs::read_dir(&self.backup_dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(err) => return Err(err.into()),
        };
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            entries.push(BackupEntry {
                size: entry.metadata()?.len(),
                name,
            });
        }
        entries.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(entries)
    }

    /// Deletes all but the newest `keep` backups, returning how many were
    /// removed.
    pub fn prune(&self, keep: usize) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let entries = self.list()?;
        let mut removed = 0;
        for entry in entries.iter().skip(keep) {
            fs::remove_file(self.backup_dir.join(&entry.name))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Restores the named backup over the database file. The current file, if
    /// any, is kept next to it with a `.pre-restore` suffix.
    pub fn restore(&self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let archive_path = self.backup_dir.join(name);
        if !archive_path.is_file() {
            return Err(format!("backup not found: {name}").into());
        }

        let mut archive = ZipArchive::new(File::open(&archive_path)?)?;
        let mut stored = archive.by_name(db_file_name(&self.db_path)?)?;

        if self.db_path.is_file() {
            let mut safety = self.db_path.clone().into_os_string();
            safety.push(".pre-restore");
            fs::copy(&self.db_path, PathBuf::from(safety))?;
        }

        let mut target = File::create(&self.db_path)?;
        io::copy(&mut stored, &mut target)?;
        Ok(())
    }
}

fn db_file_name(path: &Path) -> Result<&str, Box<dyn Error + Send + Sync>> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("invalid database path: {}", path.display()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dompet-admin-test-{tag}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn create_then_restore_round_trips_the_file() {
        let dir = scratch_dir("restore");
        let db_path = dir.join("dompet.db");
        fs::write(&db_path, b"original contents").unwrap();

        let manager = BackupManager::new(&db_path, dir.join("backups"));
        let mut counts = BTreeMap::new();
        counts.insert("users".to_string(), 1);
        let archive_path = manager.create(Some("nightly"), counts).unwrap();
        let file_name = archive_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(file_name.ends_with("-nightly.zip"));

        // The archive carries the metadata next to the database file.
        let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let mut raw = String::new();
        io::Read::read_to_string(&mut archive.by_name(METADATA_NAME).unwrap(), &mut raw).unwrap();
        assert!(raw.contains("\"users\": 1"));
        drop(archive);

        fs::write(&db_path, b"corrupted").unwrap();

        let backups = manager.list().unwrap();
        assert_eq!(backups.len(), 1);
        manager.restore(&backups[0].name).unwrap();

        assert_eq!(fs::read(&db_path).unwrap(), b"original contents");
        // The overwritten file survives as a safety copy.
        assert_eq!(
            fs::read(dir.join("dompet.db.pre-restore")).unwrap(),
            b"corrupted"
        );

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn prune_keeps_the_newest() {
        let dir = scratch_dir("prune");
        let backups = dir.join("backups");
        fs::create_dir_all(&backups).unwrap();
        for stamp in ["20250101-000000", "20250102-000000", "20250103-000000"] {
            fs::write(
                backups.join(format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}")),
                b"zip",
            )
            .unwrap();
        }
        // A stray file is left alone.
        fs::write(backups.join("notes.txt"), b"keep me").unwrap();

        let manager = BackupManager::new(dir.join("dompet.db"), &backups);
        let removed = manager.prune(2).unwrap();
        assert_eq!(removed, 1);

        let names: Vec<String> = manager.list().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                format!("{BACKUP_PREFIX}20250103-000000{BACKUP_SUFFIX}"),
                format!("{BACKUP_PREFIX}20250102-000000{BACKUP_SUFFIX}"),
            ]
        );
        assert!(backups.join("notes.txt").is_file());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = scratch_dir("missing");
        let manager = BackupManager::new(dir.join("nope.db"), dir.join("backups"));
        assert!(manager.create(None, BTreeMap::new()).is_err());
        assert!(manager.list().unwrap().is_empty());
        fs::remove_dir_all(dir).unwrap();
    }
}
