use std::sync::Arc;

use anyhow::{Context, Result};
use blake3::Hasher;
use bronze_parser::{read_table, transform_table};
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::archive::archive_file;
use crate::enumerate::{enumerate, SourceFile};
use crate::loader::Database;
use crate::pipelines::PipelineDefinition;
use crate::storage::Storage;

/// Capabilities a pipeline runs against.
#[derive(Clone)]
pub struct IngestContext {
    pub storage: Arc<dyn Storage>,
    pub database: Arc<dyn Database>,
}

impl IngestContext {
    pub fn new(storage: Arc<dyn Storage>, database: Arc<dyn Database>) -> Self {
        Self { storage, database }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Loaded,
    /// No data rows; archived without touching the table.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub key: String,
    pub archived_to: String,
    pub status: FileStatus,
    pub rows_written: u64,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub pipeline: &'static str,
    pub files: Vec<FileReport>,
}

impl PipelineRun {
    pub fn rows_written(&self) -> u64 {
        self.files.iter().map(|file| file.rows_written).sum()
    }
}

/// Reads, transforms, loads and archives one source file.
pub async fn ingest_file(
    ctx: &IngestContext,
    pipeline: &PipelineDefinition,
    source: &SourceFile,
) -> Result<FileReport> {
    let key = source.key.as_str();
    let transform = pipeline.transform;

    let contents = ctx
        .storage
        .read(key)
        .await
        .with_context(|| format!("failed to read {key}"))?;
    let content_hash = compute_hash(&contents);

    let raw = read_table(transform.schema().table, &contents)
        .with_context(|| format!("failed to decode {key}"))?;

    let (status, rows_written) = if raw.headers.is_empty() {
        (FileStatus::Empty, 0)
    } else {
        let batch = transform_table(transform, &raw, key)
            .with_context(|| format!("failed to transform {key}"))?;
        if batch.is_empty() {
            (FileStatus::Empty, 0)
        } else {
            let written = ctx
                .database
                .load(&batch, pipeline.policy)
                .await
                .with_context(|| format!("failed to load {key} into {}", batch.schema.table))?;
            (FileStatus::Loaded, written)
        }
    };

    let archived_to = archive_file(ctx.storage.as_ref(), key)
        .await
        .with_context(|| format!("failed to archive {key}"))?;

    info!(
        pipeline = pipeline.code,
        key,
        status = ?status,
        rows = rows_written,
        "Processed source file"
    );

    Ok(FileReport {
        key: key.to_string(),
        archived_to,
        status,
        rows_written,
        content_hash,
    })
}

/// Processes every pending file of a pipeline in order, stopping at the first
/// failure.
pub async fn run_pipeline(ctx: &IngestContext, pipeline: &PipelineDefinition) -> Result<PipelineRun> {
    let span = info_span!("pipeline", pipeline = pipeline.code);
    async {
        let pending = enumerate(ctx.storage.as_ref(), &pipeline.prefix, &pipeline.selector).await?;
        if pending.is_empty() {
            info!(prefix = %pipeline.prefix, "No files to process");
        }

        let mut files = Vec::with_capacity(pending.len());
        for source in &pending {
            files.push(ingest_file(ctx, pipeline, source).await?);
        }

        let run = PipelineRun {
            pipeline: pipeline.code,
            files,
        };
        info!(
            files = run.files.len(),
            rows = run.rows_written(),
            "Pipeline finished"
        );
        Ok(run)
    }
    .instrument(span)
    .await
}

pub fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
