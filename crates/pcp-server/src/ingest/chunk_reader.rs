//! Streaming CSV row reader
//!
//! Consumes an upload byte stream incrementally through a bounded read
//! buffer (the chunk size), yielding one logical row at a time. Rows that
//! span chunk boundaries are handled by the incremental CSV reader and
//! are never dropped or duplicated. The whole file is never materialized.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use pcp_common::types::{ProductRecord, PRODUCT_FIELDS};
use pcp_common::CatalogError;
use tokio::io::AsyncRead;

/// Lazy row sequence over a CSV byte stream
///
/// Construction validates the header: the three canonical fields `name`,
/// `sku`, `description` must all be present (case-insensitive, trimmed);
/// extra unknown fields are ignored. Restartable only from the source.
#[derive(Debug)]
pub struct ChunkReader<R: AsyncRead + Unpin + Send> {
    reader: AsyncReader<R>,
    // column index of each canonical field, in PRODUCT_FIELDS order
    columns: [usize; 3],
    buffer: StringRecord,
    line: u64,
}

impl<R: AsyncRead + Unpin + Send> ChunkReader<R> {
    /// Wrap a byte source, reading at most `chunk_size` bytes at a time
    pub async fn new(source: R, chunk_size: usize) -> Result<Self, CatalogError> {
        let mut reader = AsyncReaderBuilder::new()
            .buffer_capacity(chunk_size)
            .create_reader(source);

        let headers = reader
            .headers()
            .await
            .map_err(|e| CatalogError::MalformedInput(format!("unreadable header row: {}", e)))?;

        let mut columns = [usize::MAX; 3];
        for (index, raw) in headers.iter().enumerate() {
            let field = raw.trim().to_lowercase();
            if let Some(slot) = PRODUCT_FIELDS.iter().position(|f| *f == field) {
                if columns[slot] == usize::MAX {
                    columns[slot] = index;
                }
            }
        }

        if let Some(missing) = columns
            .iter()
            .position(|&column| column == usize::MAX)
            .map(|slot| PRODUCT_FIELDS[slot])
        {
            return Err(CatalogError::MalformedInput(format!(
                "header is missing required field '{}' (expected at least: {})",
                missing,
                PRODUCT_FIELDS.join(", ")
            )));
        }

        Ok(Self {
            reader,
            columns,
            buffer: StringRecord::new(),
            line: 1,
        })
    }

    /// Read the next logical row, or `None` when the stream is exhausted
    pub async fn next_row(&mut self) -> Result<Option<ProductRecord>, CatalogError> {
        let has_row = self
            .reader
            .read_record(&mut self.buffer)
            .await
            .map_err(|e| CatalogError::MalformedInput(format!("bad row: {}", e)))?;

        if !has_row {
            return Ok(None);
        }
        self.line += 1;

        let [name, sku, description] = self.columns;
        let field = |index: usize, label: &str| -> Result<String, CatalogError> {
            self.buffer
                .get(index)
                .map(str::to_string)
                .ok_or_else(|| {
                    CatalogError::MalformedInput(format!(
                        "row {} is missing the '{}' field",
                        self.line, label
                    ))
                })
        };

        Ok(Some(ProductRecord {
            name: field(name, "name")?,
            sku: field(sku, "sku")?,
            description: field(description, "description")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use tokio_util::io::StreamReader;

    async fn collect<R: AsyncRead + Unpin + Send>(
        mut reader: ChunkReader<R>,
    ) -> Vec<ProductRecord> {
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row().await.unwrap() {
            rows.push(row);
        }
        rows
    }

    #[tokio::test]
    async fn test_reads_all_rows() {
        let input = "name,sku,description\nWidget,SKU-1,small\nGadget,SKU-2,large\n";
        let reader = ChunkReader::new(input.as_bytes(), 64 * 1024).await.unwrap();
        let rows = collect(reader).await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ProductRecord::new("Widget", "SKU-1", "small"));
        assert_eq!(rows[1], ProductRecord::new("Gadget", "SKU-2", "large"));
    }

    #[tokio::test]
    async fn test_rows_spanning_chunk_boundaries_are_intact() {
        let input = "name,sku,description\nWidget,SKU-1,small\nGadget,SKU-2,large\nDoodad,SKU-3,medium\n";
        // Feed the bytes two at a time so every row straddles several chunks.
        let chunks: Vec<Result<Bytes, std::io::Error>> = input
            .as_bytes()
            .chunks(2)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let source = StreamReader::new(stream::iter(chunks));

        let reader = ChunkReader::new(source, 16).await.unwrap();
        let rows = collect(reader).await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], ProductRecord::new("Doodad", "SKU-3", "medium"));
    }

    #[tokio::test]
    async fn test_missing_header_field_is_malformed_input() {
        let input = "name,sku\nWidget,SKU-1\n";
        let err = ChunkReader::new(input.as_bytes(), 1024).await.unwrap_err();
        assert!(matches!(err, CatalogError::MalformedInput(_)));
        assert!(err.to_string().contains("description"));
    }

    #[tokio::test]
    async fn test_empty_input_is_malformed_input() {
        let err = ChunkReader::new(&b""[..], 1024).await.unwrap_err();
        assert!(matches!(err, CatalogError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_extra_fields_are_ignored() {
        let input = "price,name,sku,internal_id,description\n9.99,Widget,SKU-1,77,small\n";
        let reader = ChunkReader::new(input.as_bytes(), 1024).await.unwrap();
        let rows = collect(reader).await;

        assert_eq!(rows, vec![ProductRecord::new("Widget", "SKU-1", "small")]);
    }

    #[tokio::test]
    async fn test_header_matching_is_case_insensitive() {
        let input = "Name, SKU ,Description\nWidget,SKU-1,small\n";
        let reader = ChunkReader::new(input.as_bytes(), 1024).await.unwrap();
        let rows = collect(reader).await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "SKU-1");
    }

    #[tokio::test]
    async fn test_header_only_input_yields_no_rows() {
        let input = "name,sku,description\n";
        let reader = ChunkReader::new(input.as_bytes(), 1024).await.unwrap();
        let rows = collect(reader).await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_quoted_fields_with_embedded_commas() {
        let input = "name,sku,description\n\"Widget, deluxe\",SKU-1,\"has, commas\"\n";
        let reader = ChunkReader::new(input.as_bytes(), 1024).await.unwrap();
        let rows = collect(reader).await;

        assert_eq!(
            rows,
            vec![ProductRecord::new("Widget, deluxe", "SKU-1", "has, commas")]
        );
    }
}
