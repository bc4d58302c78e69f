//! JSONL journal collaborator - append-only, one file per day

use crate::collaborator::{LoanStore, PoolStore, StatusNotifier};
use crate::error::BusError;
use crate::event::LoanEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flashpool_ledger::LoanView;
use flashpool_pool::Pool;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// What a journal line holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum JournalEntry {
    Loan(LoanView),
    Pool(Pool),
    Event(LoanEvent),
}

/// One line of the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub recorded_at: DateTime<Utc>,
    pub entry: JournalEntry,
}

struct Writer {
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
}

/// Append-only JSONL store for loans, pool snapshots and events
///
/// Every record is flushed before the call returns. Files rotate on the UTC
/// date of `recorded_at`.
pub struct JournalStore {
    base_path: PathBuf,
    writer: Mutex<Writer>,
}

impl JournalStore {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, BusError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            writer: Mutex::new(Writer {
                current_file: None,
                current_date: None,
            }),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn append(&self, entry: JournalEntry) -> Result<(), BusError> {
        let record = JournalRecord {
            recorded_at: Utc::now(),
            entry,
        };
        let date = record.recorded_at.format("%Y-%m-%d").to_string();
        let json = serde_json::to_string(&record)?;

        let mut writer = self.writer.lock();

        // Rotate file if date changed
        if writer.current_date.as_ref() != Some(&date) {
            if let Some(ref mut file) = writer.current_file {
                file.flush()?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.base_path.join(format!("{}.jsonl", date)))?;
            writer.current_file = Some(BufWriter::new(file));
            writer.current_date = Some(date);
        }

        if let Some(ref mut file) = writer.current_file {
            writeln!(file, "{}", json)?;
            file.flush()?;
        }

        Ok(())
    }

    /// List all JSONL files in the store, oldest first
    pub fn list_files(&self) -> Result<Vec<PathBuf>, BusError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "jsonl") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Read every record from every file in order
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, BusError> {
        let mut records = Vec::new();

        for path in self.list_files()? {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line)?);
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl LoanStore for JournalStore {
    fn name(&self) -> &str {
        "journal"
    }

    async fn persist_loan(&self, loan: &LoanView) -> Result<(), BusError> {
        self.append(JournalEntry::Loan(loan.clone()))
    }
}

#[async_trait]
impl PoolStore for JournalStore {
    fn name(&self) -> &str {
        "journal"
    }

    async fn persist_pool_state(&self, pool: &Pool) -> Result<(), BusError> {
        self.append(JournalEntry::Pool(pool.clone()))
    }
}

#[async_trait]
impl StatusNotifier for JournalStore {
    fn name(&self) -> &str {
        "journal"
    }

    async fn notify(&self, event: &LoanEvent) -> Result<(), BusError> {
        self.append(JournalEntry::Event(event.clone()))
    }
}
