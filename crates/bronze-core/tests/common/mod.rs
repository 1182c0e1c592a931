#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use bronze_core::storage::LocalStorage;
use bronze_core::{Database, IngestContext, LoadPolicy};
use bronze_parser::{CanonicalRow, TableBatch};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct StoredRow {
    pub source_file: String,
    pub row: CanonicalRow,
}

/// In-memory stand-in for Postgres with the same delete-then-insert contract.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<HashMap<String, Vec<StoredRow>>>,
    failures_left: AtomicU32,
    insert_failures_left: AtomicU32,
    loads: AtomicU32,
}

impl MemoryDatabase {
    /// Fails the next `times` loads before behaving normally.
    pub fn failing(times: u32) -> Self {
        let db = Self::default();
        db.failures_left.store(times, Ordering::SeqCst);
        db
    }

    /// Fails the next `times` loads after the replace delete has run, so the
    /// load must roll back.
    pub fn fail_inserts(&self, times: u32) {
        self.insert_failures_left.store(times, Ordering::SeqCst);
    }

    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn count_source(&self, table: &str, source_file: &str) -> usize {
        self.rows(table)
            .iter()
            .filter(|row| row.source_file == source_file)
            .count()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn load(&self, batch: &TableBatch, policy: LoadPolicy) -> Result<u64> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            bail!("simulated database outage");
        }

        let mut tables = self.tables.lock().unwrap();
        let committed = tables.entry(batch.schema.table.to_string()).or_default();

        // Work on a copy; it only replaces the table on commit.
        let mut rows = committed.clone();
        if policy == LoadPolicy::ReplaceSource {
            rows.retain(|row| row.source_file != batch.source_file);
        }

        let insert_failures = self.insert_failures_left.load(Ordering::SeqCst);
        if insert_failures > 0 {
            self.insert_failures_left
                .store(insert_failures - 1, Ordering::SeqCst);
            bail!("simulated insert failure");
        }

        rows.extend(batch.rows.iter().cloned().map(|row| StoredRow {
            source_file: batch.source_file.clone(),
            row,
        }));
        *committed = rows;
        Ok(batch.len() as u64)
    }

    async fn delete_source(&self, table: &str, source_file: &str) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| row.source_file != source_file);
        Ok((before - rows.len()) as u64)
    }
}

/// A temporary data root with helpers to stage uploads.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root().join(key)
    }

    pub fn put(&self, key: &str, contents: impl AsRef<[u8]>) {
        let path = self.path(key);
        std::fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
        std::fs::write(path, contents).expect("write file");
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    pub fn storage(&self) -> Arc<LocalStorage> {
        Arc::new(LocalStorage::new(self.root()))
    }

    pub fn context(&self, database: Arc<MemoryDatabase>) -> IngestContext {
        IngestContext::new(self.storage(), database)
    }
}

pub fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../bronze-parser/tests/data")
        .join(name);
    std::fs::read(path).expect("read fixture")
}

pub const LISTINGS_TABLE: &str = "bronze.airbnb_listings_raw";

pub fn listings_csv(ids: &[i64]) -> String {
    let mut csv = String::from("LISTING_ID,SCRAPED_DATE,PRICE,NEIGHBOURHOOD_CLEANSED\n");
    for id in ids {
        csv.push_str(&format!("{id},01/05/2020,100,Sydney\n"));
    }
    csv
}
