//! Parquet I/O for edge lists and rank vectors
//!
//! Based on `DuckDB` (Raasveldt et al., SIGMOD 2019) columnar storage patterns.
//!
//! # Format
//!
//! Edge lists are stored as two Parquet files:
//! - `{path}_edges.parquet`: (tail, head)
//! - `{path}_nodes.parquet`: (`node_id`, `out_degree`, `in_degree`)
//!
//! Rank vectors are stored as `{path}_ranks.parquet`: (`node_id`, rank)

use super::edges::EdgeList;
use anyhow::{Context, Result};
use arrow::array::{Array, Float32Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

impl EdgeList {
    /// Write the edge list to Parquet files
    ///
    /// Creates two files:
    /// - `{path}_edges.parquet`: edge pairs (tail, head) in input order
    /// - `{path}_nodes.parquet`: per-node degrees (`node_id`, `out_degree`, `in_degree`)
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let base_path = path.as_ref();

        let (tails, heads): (Vec<u32>, Vec<u32>) =
            self.pairs().iter().map(|&[t, h]| (t, h)).unzip();
        write_batch(
            &format!("{}_edges.parquet", base_path.display()),
            vec![
                Field::new("tail", DataType::UInt32, false),
                Field::new("head", DataType::UInt32, false),
            ],
            vec![
                Arc::new(UInt32Array::from(tails)),
                Arc::new(UInt32Array::from(heads)),
            ],
        )?;

        #[allow(clippy::cast_possible_truncation)] // node ids are u32 by construction
        let node_ids: Vec<u32> = (0..self.nodes_count()).map(|n| n as u32).collect();
        write_batch(
            &format!("{}_nodes.parquet", base_path.display()),
            vec![
                Field::new("node_id", DataType::UInt32, false),
                Field::new("out_degree", DataType::UInt32, false),
                Field::new("in_degree", DataType::UInt32, false),
            ],
            vec![
                Arc::new(UInt32Array::from(node_ids)),
                Arc::new(UInt32Array::from(self.out_degree().to_vec())),
                Arc::new(UInt32Array::from(self.in_degree().to_vec())),
            ],
        )
    }

    /// Read an edge list written by [`EdgeList::write_parquet`]
    ///
    /// Degrees are taken from the nodes file as stored; layout builders
    /// re-check them against the pairs.
    ///
    /// # Errors
    ///
    /// Returns error if files don't exist, Arrow conversion fails or a pair
    /// references a node that is not in the nodes file
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref();

        let mut pairs = Vec::new();
        for batch in read_batches(&format!("{}_edges.parquet", base_path.display()))? {
            let tails = u32_column(&batch, 0, "tail")?;
            let heads = u32_column(&batch, 1, "head")?;
            pairs.extend(
                tails
                    .values()
                    .iter()
                    .zip(heads.values().iter())
                    .map(|(&t, &h)| [t, h]),
            );
        }

        let mut out_degree = Vec::new();
        let mut in_degree = Vec::new();
        for batch in read_batches(&format!("{}_nodes.parquet", base_path.display()))? {
            out_degree.extend_from_slice(u32_column(&batch, 1, "out_degree")?.values());
            in_degree.extend_from_slice(u32_column(&batch, 2, "in_degree")?.values());
        }

        Self::from_raw_parts(out_degree.len(), pairs, out_degree, in_degree)
    }
}

/// Write a rank vector to `{path}_ranks.parquet`
///
/// # Errors
///
/// Returns error if file I/O fails or Arrow conversion fails
#[allow(clippy::unused_async)] // Async API for future I/O operations
pub async fn write_ranks_parquet<P: AsRef<Path>>(path: P, scores: &[f32]) -> Result<()> {
    let base_path = path.as_ref();
    #[allow(clippy::cast_possible_truncation)]
    let node_ids: Vec<u32> = (0..scores.len()).map(|n| n as u32).collect();
    write_batch(
        &format!("{}_ranks.parquet", base_path.display()),
        vec![
            Field::new("node_id", DataType::UInt32, false),
            Field::new("rank", DataType::Float32, false),
        ],
        vec![
            Arc::new(UInt32Array::from(node_ids)),
            Arc::new(Float32Array::from(scores.to_vec())),
        ],
    )
}

/// Read a rank vector written by [`write_ranks_parquet`]
///
/// # Errors
///
/// Returns error if the file doesn't exist or Arrow conversion fails
#[allow(clippy::unused_async)] // Async API for future I/O operations
pub async fn read_ranks_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let base_path = path.as_ref();
    let mut scores = Vec::new();
    for batch in read_batches(&format!("{}_ranks.parquet", base_path.display()))? {
        let ranks = batch
            .column(1)
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("Invalid rank column type")?;
        scores.extend_from_slice(ranks.values());
    }
    Ok(scores)
}

fn write_batch(
    file_path: &str,
    fields: Vec<Field>,
    columns: Vec<Arc<dyn Array>>,
) -> Result<()> {
    let schema = Arc::new(Schema::new(fields));

    let batch = RecordBatch::try_new(schema.clone(), columns)
        .with_context(|| format!("Failed to create RecordBatch for {file_path}"))?;

    let file = File::create(file_path).with_context(|| format!("Failed to create {file_path}"))?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3)?,
        ))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn read_batches(file_path: &str) -> Result<Vec<RecordBatch>> {
    let file = File::open(file_path).with_context(|| format!("Failed to open {file_path}"))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    reader
        .map(|batch| batch.with_context(|| format!("Failed to read {file_path}")))
        .collect()
}

fn u32_column<'a>(batch: &'a RecordBatch, index: usize, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .with_context(|| format!("Invalid {name} column type"))
}
