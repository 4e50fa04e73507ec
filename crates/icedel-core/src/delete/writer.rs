//! Equality delete file writers.
//!
//! A writer hands out sessions. A session is the scoped resource used to
//! materialize one delete file and is released when dropped, so every exit
//! path of a delete attempt gives it back.

use crate::{Error, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Arrow field metadata key carrying the Iceberg field id.
const PARQUET_FIELD_ID_KEY: &str = "PARQUET:field_id";

/// A materialized delete file.
#[derive(Debug, Clone)]
pub struct DeleteFile {
    /// Encoded file contents
    pub bytes: Bytes,
    /// Number of rows written
    pub record_count: usize,
}

/// Source of delete file sessions.
#[async_trait]
pub trait DeleteFileWriter: Send + Sync {
    /// Acquire a session for one delete file.
    async fn open(&self) -> Result<Box<dyn DeleteFileSession>>;
}

/// A scoped delete file session.
#[async_trait]
pub trait DeleteFileSession: Send {
    /// Write a single-column equality delete file containing `ids`.
    async fn write_equality_deletes(
        &mut self,
        column: &str,
        field_id: i32,
        ids: &[String],
    ) -> Result<DeleteFile>;
}

/// Parquet delete files built in memory with Arrow.
#[derive(Debug, Clone)]
pub struct ParquetDeleteFileWriter {
    compression: Compression,
    open_sessions: Arc<AtomicUsize>,
}

impl ParquetDeleteFileWriter {
    /// Writer producing Snappy-compressed files.
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the compression codec.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sessions currently held.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl Default for ParquetDeleteFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeleteFileWriter for ParquetDeleteFileWriter {
    async fn open(&self) -> Result<Box<dyn DeleteFileSession>> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ParquetDeleteSession {
            compression: self.compression,
            open_sessions: Arc::clone(&self.open_sessions),
        }))
    }
}

struct ParquetDeleteSession {
    compression: Compression,
    open_sessions: Arc<AtomicUsize>,
}

impl Drop for ParquetDeleteSession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeleteFileSession for ParquetDeleteSession {
    async fn write_equality_deletes(
        &mut self,
        column: &str,
        field_id: i32,
        ids: &[String],
    ) -> Result<DeleteFile> {
        let field = Field::new(column, DataType::Utf8, false).with_metadata(HashMap::from([(
            PARQUET_FIELD_ID_KEY.to_string(),
            field_id.to_string(),
        )]));
        let schema = Arc::new(Schema::new(vec![field]));

        let values: ArrayRef = Arc::new(StringArray::from_iter_values(ids.iter()));
        let batch = RecordBatch::try_new(Arc::clone(&schema), vec![values])
            .map_err(|e| Error::DeleteFile(format!("Failed to build record batch: {}", e)))?;

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();

        let mut buffer = Cursor::new(Vec::new());
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props)).map_err(|e| {
            Error::DeleteFile(format!("Failed to create Parquet writer: {}", e))
        })?;

        writer
            .write(&batch)
            .map_err(|e| Error::DeleteFile(format!("Failed to write delete ids: {}", e)))?;

        writer
            .close()
            .map_err(|e| Error::DeleteFile(format!("Failed to close Parquet writer: {}", e)))?;

        Ok(DeleteFile {
            bytes: Bytes::from(buffer.into_inner()),
            record_count: ids.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    #[tokio::test]
    async fn test_write_equality_deletes() {
        let writer = ParquetDeleteFileWriter::new();
        let mut session = writer.open().await.unwrap();

        let ids = vec!["id-001".to_string(), "O'Brien".to_string()];
        let file = session.write_equality_deletes("id", 2, &ids).await.unwrap();
        assert_eq!(file.record_count, 2);
        assert_eq!(&file.bytes[..4], b"PAR1");

        let reader = ParquetRecordBatchReaderBuilder::try_new(file.bytes.clone())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        let field = batch.schema().field(0).clone();
        assert_eq!(field.name(), "id");
        assert_eq!(
            field.metadata().get(PARQUET_FIELD_ID_KEY).map(String::as_str),
            Some("2")
        );

        let column = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(column.len(), 2);
        assert_eq!(column.value(1), "O'Brien");
    }

    #[tokio::test]
    async fn test_sessions_released_on_drop() {
        let writer = ParquetDeleteFileWriter::new().with_compression(Compression::UNCOMPRESSED);
        assert_eq!(writer.open_sessions(), 0);

        let first = writer.open().await.unwrap();
        let second = writer.open().await.unwrap();
        assert_eq!(writer.open_sessions(), 2);

        drop(first);
        assert_eq!(writer.open_sessions(), 1);
        drop(second);
        assert_eq!(writer.open_sessions(), 0);
    }
}
