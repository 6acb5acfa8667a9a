use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use nightswap_core::{CoreError, LeaseBackupInfo, LeaseRecord, LeaseStorage};
use nightswap_domain::LeaseId;

const FILE_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
pub const DEFAULT_RETENTION: usize = 5;

/// Directory layout used by [`JsonLeaseStorage`].
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub lease_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// `<root>/leases` and `<root>/backups`.
    pub fn under(root: &Path) -> Self {
        Self {
            lease_root: root.join("leases"),
            backup_root: root.join("backups"),
        }
    }
}

/// Filesystem-backed JSON persistence for leases and their backups.
///
/// Each lease lives in `<lease_root>/<lease-id>.json`. Every overwrite first
/// copies the previous file into `<backup_root>/<lease-id>/`, keeping at most
/// `retention` backups per lease.
#[derive(Debug, Clone)]
pub struct JsonLeaseStorage {
    paths: StoragePaths,
    retention: usize,
}

impl JsonLeaseStorage {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.lease_root)?;
        fs::create_dir_all(&paths.backup_root)?;
        Ok(Self {
            paths,
            retention: retention.max(1),
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn lease_path(&self, id: LeaseId) -> PathBuf {
        self.paths
            .lease_root
            .join(format!("{}.{}", id, FILE_EXTENSION))
    }

    fn backup_dir(&self, id: LeaseId) -> PathBuf {
        self.paths.backup_root.join(id.to_string())
    }

    fn write_backup(
        &self,
        id: LeaseId,
        note: Option<&str>,
        contents: BackupSource<'_>,
    ) -> Result<LeaseBackupInfo, CoreError> {
        let dir = self.backup_dir(id);
        fs::create_dir_all(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut stem = format!("{}_{}", id.short(), timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let file_name = format!("{}.{}", stem, FILE_EXTENSION);
        let path = dir.join(&file_name);
        match contents {
            BackupSource::Record(record) => write_atomic(&path, &serialize_record(record)?)?,
            BackupSource::File(existing) => {
                fs::copy(existing, &path)?;
            }
        }
        self.prune_backups(id)?;
        Ok(LeaseBackupInfo {
            lease: id,
            id: file_name,
            created_at: timestamp,
            path,
        })
    }

    fn prune_backups(&self, id: LeaseId) -> Result<(), CoreError> {
        for stale in self.list_backups(id)?.into_iter().skip(self.retention) {
            fs::remove_file(stale.path)?;
        }
        Ok(())
    }
}

enum BackupSource<'a> {
    Record(&'a LeaseRecord),
    File(&'a Path),
}

impl LeaseStorage for JsonLeaseStorage {
    fn save_lease(&self, record: &LeaseRecord) -> Result<(), CoreError> {
        let id = record.lease.id;
        let path = self.lease_path(id);
        if path.exists() {
            self.write_backup(id, None, BackupSource::File(&path))?;
        }
        let tmp = tmp_path(&path);
        write_atomic(&tmp, &serialize_record(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load_lease(&self, id: LeaseId) -> Result<LeaseRecord, CoreError> {
        let path = self.lease_path(id);
        if !path.exists() {
            return Err(CoreError::LeaseNotFound(id));
        }
        load_record_from_path(&path)
    }

    fn list_leases(&self) -> Result<Vec<LeaseId>, CoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.paths.lease_root)? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION)
            {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<LeaseId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }

    fn backup_lease(
        &self,
        record: &LeaseRecord,
        note: Option<&str>,
    ) -> Result<LeaseBackupInfo, CoreError> {
        self.write_backup(record.lease.id, note, BackupSource::Record(record))
    }

    fn list_backups(&self, id: LeaseId) -> Result<Vec<LeaseBackupInfo>, CoreError> {
        let dir = self.backup_dir(id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                let created_at = parse_backup_timestamp(file_name)
                    .map(|at| at.format(BACKUP_TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default();
                entries.push(LeaseBackupInfo {
                    lease: id,
                    id: file_name.to_string(),
                    created_at,
                    path: path.clone(),
                });
            }
        }
        entries.sort_by(|a, b| {
            Reverse(parse_backup_timestamp(&a.id))
                .cmp(&Reverse(parse_backup_timestamp(&b.id)))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    fn restore_backup(&self, backup: &LeaseBackupInfo) -> Result<LeaseRecord, CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let record = load_record_from_path(&backup.path)?;
        if record.lease.id != backup.lease {
            return Err(CoreError::Storage(format!(
                "backup `{}` belongs to lease {}",
                backup.id, record.lease.id
            )));
        }
        let target = self.lease_path(backup.lease);
        let tmp = tmp_path(&target);
        fs::copy(&backup.path, &tmp)?;
        fs::rename(&tmp, &target)?;
        Ok(record)
    }
}

/// Loads a lease record from an arbitrary path on disk.
pub fn load_record_from_path(path: &Path) -> Result<LeaseRecord, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| {
        CoreError::Storage(format!("failed to parse {}: {}", path.display(), err))
    })
}

fn serialize_record(record: &LeaseRecord) -> Result<String, CoreError> {
    serde_json::to_string_pretty(record).map_err(|err| CoreError::Storage(err.to_string()))
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the stamp out of `<short-id>_<YYYYMMDD>_<HHMMSS>[_note].json`.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(&format!(".{}", FILE_EXTENSION))?;
    let mut segments = stem.split('_').skip(1);
    let date = segments.next()?;
    let time = segments.next()?;
    if !is_digits(date, 8) || !is_digits(time, 6) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
