//! Rebuild object and index files from the audit trail.
//!
//! The audit directory is read day by day (object file before index file for
//! the same day) and each record is re-appended to the target store's
//! changelog or index file. The target's own audit log is not written: the
//! source trail remains the record of what happened.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::audit::{AuditKind, AuditRecord};
use crate::codec;
use crate::error::StoreResult;
use crate::partition;
use crate::queue::PendingAppend;
use crate::store::Store;

/// Summary of a rebuild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Audit files read.
    pub files: usize,
    /// Object change records re-applied.
    pub object_records: usize,
    /// Index entries re-applied.
    pub index_records: usize,
    /// Lines that could not be parsed and were left out.
    pub skipped: usize,
}

pub struct Recovery;

impl Recovery {
    /// Replay every audit file in `audit_dir` into `target`.
    pub async fn rebuild(audit_dir: &Path, target: &Store) -> StoreResult<RecoveryReport> {
        let files = audit_files(audit_dir).await?;
        let mut report = RecoveryReport::default();
        let mut pending: Vec<PendingAppend> = Vec::new();

        for (_, kind, path) in &files {
            let content = target.read_file(path).await?;
            report.files += 1;

            for line in content.lines().filter(|l| !l.is_empty()) {
                let Some(record) = AuditRecord::parse(*kind, line) else {
                    warn!(file = %path.display(), line, "unparseable audit line; skipping");
                    report.skipped += 1;
                    continue;
                };
                pending.push(replay_record(target, &record, &mut report)?);
            }
        }

        for append in pending {
            append.await?;
        }

        info!(
            files = report.files,
            objects = report.object_records,
            indexes = report.index_records,
            skipped = report.skipped,
            "rebuild from audit log complete"
        );
        Ok(report)
    }
}

fn replay_record(
    target: &Store,
    record: &AuditRecord,
    report: &mut RecoveryReport,
) -> StoreResult<PendingAppend> {
    let root = target.root();
    match record {
        AuditRecord::Object { id, change } => {
            report.object_records += 1;
            let line = codec::serialize(change)?;
            Ok(target
                .queue()
                .append(partition::object_path(root, id), &line))
        }
        AuditRecord::Index { id, key, .. } => {
            report.index_records += 1;
            Ok(target
                .queue()
                .append(partition::index_path(root, key), id.as_str()))
        }
    }
}

/// Audit files in chronological order.
async fn audit_files(dir: &Path) -> StoreResult<Vec<(NaiveDate, AuditKind, PathBuf)>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some((kind, date)) = name.to_str().and_then(AuditKind::parse_file_name) else {
            continue;
        };
        files.push((date, kind, entry.path()));
    }
    files.sort();
    Ok(files)
}
