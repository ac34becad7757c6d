// ABOUTME: Timestamped backup snapshots of store files, taken before every overwrite or delete.
// ABOUTME: Handles snapshot naming, listing, count-based retention, and full-directory backups.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use hollowdex_core::Collection;
use serde::Serialize;
use thiserror::Error;

/// Timestamp layout used in snapshot file names: ISO 8601 with `:` and `.`
/// replaced by `-` so the name is valid on every filesystem.
const STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

/// Errors that can occur while writing or reading backups.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl BackupError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        BackupError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What produced a snapshot. Each (tag, collection) pair is one stream for
/// retention purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupTag {
    /// Published document about to be overwritten.
    Web,
    /// Draft document about to be overwritten.
    Admin,
    /// Draft document about to be deleted by session cleanup.
    AdminCleanup,
}

impl BackupTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupTag::Web => "web",
            BackupTag::Admin => "admin",
            BackupTag::AdminCleanup => "admin_cleanup",
        }
    }

    // Longest prefix first so "admin_cleanup_" is not read as "admin_".
    const PARSE_ORDER: [BackupTag; 3] = [BackupTag::AdminCleanup, BackupTag::Admin, BackupTag::Web];
}

/// One snapshot file found in the archive.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub file_name: String,
    pub tag: BackupTag,
    pub collection: Collection,
    pub taken_at: DateTime<Utc>,
    pub size: u64,
    #[serde(skip)]
    seq: u32,
}

/// The backup directory plus its retention policy.
#[derive(Debug, Clone)]
pub struct BackupArchive {
    dir: PathBuf,
    retain: Option<usize>,
}

impl BackupArchive {
    /// Open the archive at `dir`, creating it if needed. `retain` caps the
    /// number of snapshots kept per (tag, collection) stream; None keeps all.
    pub fn open(dir: PathBuf, retain: Option<usize>) -> Result<Self, BackupError> {
        fs::create_dir_all(&dir).map_err(|e| BackupError::io(&dir, e))?;
        Ok(Self { dir, retain })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` verbatim into a new snapshot file, then prune the
    /// stream down to the retention limit. Returns the snapshot path.
    pub fn snapshot(
        &self,
        tag: BackupTag,
        collection: Collection,
        source: &Path,
    ) -> Result<PathBuf, BackupError> {
        let target = self.unique_path(tag, collection, Utc::now());
        fs::copy(source, &target).map_err(|e| BackupError::io(&target, e))?;
        tracing::debug!(
            "backed up {} to {}",
            source.display(),
            target.display()
        );

        if let Some(keep) = self.retain {
            self.prune(tag, collection, keep)?;
        }

        Ok(target)
    }

    /// List every snapshot in the archive, oldest first. Files that do not
    /// follow the naming scheme are ignored.
    pub fn list(&self) -> Result<Vec<BackupEntry>, BackupError> {
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir).map_err(|e| BackupError::io(&self.dir, e))? {
            let dir_entry = dir_entry.map_err(|e| BackupError::io(&self.dir, e))?;
            let path = dir_entry.path();
            if !path.is_file() {
                continue;
            }

            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let Some(parsed) = parse_snapshot_name(&name) else {
                continue;
            };
            let size = dir_entry
                .metadata()
                .map_err(|e| BackupError::io(&path, e))?
                .len();

            entries.push(BackupEntry {
                file_name: name,
                tag: parsed.tag,
                collection: parsed.collection,
                taken_at: parsed.taken_at,
                size,
                seq: parsed.seq,
            });
        }

        entries.sort_by(|a, b| {
            (a.taken_at, a.seq, &a.file_name).cmp(&(b.taken_at, b.seq, &b.file_name))
        });
        Ok(entries)
    }

    /// Copy each of `files` into a fresh `full_backup_<stamp>` directory.
    /// Missing sources are skipped. Returns the directory path.
    pub fn full_backup(&self, files: &[(Collection, PathBuf)]) -> Result<PathBuf, BackupError> {
        let stamp = Utc::now().format(STAMP_FORMAT).to_string();
        let target_dir = self.dir.join(format!("full_backup_{stamp}"));
        fs::create_dir_all(&target_dir).map_err(|e| BackupError::io(&target_dir, e))?;

        for (collection, source) in files {
            if !source.exists() {
                continue;
            }
            let target = target_dir.join(format!("{collection}.json"));
            fs::copy(source, &target).map_err(|e| BackupError::io(&target, e))?;
        }

        Ok(target_dir)
    }

    fn unique_path(&self, tag: BackupTag, collection: Collection, at: DateTime<Utc>) -> PathBuf {
        let stem = format!("{}_{}_{}", tag.as_str(), collection, at.format(STAMP_FORMAT));
        let first = self.dir.join(format!("{stem}.json"));
        if !first.exists() {
            return first;
        }

        let mut seq = 1u32;
        loop {
            let candidate = self.dir.join(format!("{stem}-{seq}.json"));
            if !candidate.exists() {
                return candidate;
            }
            seq += 1;
        }
    }

    fn prune(&self, tag: BackupTag, collection: Collection, keep: usize) -> Result<(), BackupError> {
        let stream: Vec<BackupEntry> = self
            .list()?
            .into_iter()
            .filter(|e| e.tag == tag && e.collection == collection)
            .collect();

        if stream.len() <= keep {
            return Ok(());
        }

        let excess = stream.len() - keep;
        for entry in stream.into_iter().take(excess) {
            let path = self.dir.join(&entry.file_name);
            fs::remove_file(&path).map_err(|e| BackupError::io(&path, e))?;
            tracing::debug!("pruned backup {}", entry.file_name);
        }

        Ok(())
    }
}

struct ParsedName {
    tag: BackupTag,
    collection: Collection,
    taken_at: DateTime<Utc>,
    seq: u32,
}

/// Parse `{tag}_{collection}_{stamp}[-{seq}].json`.
fn parse_snapshot_name(name: &str) -> Option<ParsedName> {
    let stem = name.strip_suffix(".json")?;

    let (tag, rest) = BackupTag::PARSE_ORDER.iter().find_map(|tag| {
        stem.strip_prefix(tag.as_str())
            .and_then(|r| r.strip_prefix('_'))
            .map(|r| (*tag, r))
    })?;

    let (collection_name, stamp_and_seq) = rest.split_once('_')?;
    let collection = collection_name.parse::<Collection>().ok()?;

    let z = stamp_and_seq.find('Z')?;
    let (stamp, suffix) = stamp_and_seq.split_at(z + 1);
    let seq = match suffix.strip_prefix('-') {
        Some(n) => n.parse().ok()?,
        None if suffix.is_empty() => 0,
        None => return None,
    };

    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    Some(ParsedName {
        tag,
        collection,
        taken_at: naive.and_utc(),
        seq,
    })
}
