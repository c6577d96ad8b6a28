use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::chunker::{Chunk, ChunkError, chunk_pages};

/// Source of per-page plain text for a schedule document.
pub trait PageExtractor: Send + Sync + 'static {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ChunkError>;
}

/// Reads page text out of PDF files with `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PageExtractor for PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ChunkError> {
        pdf_extract::extract_text_by_pages(path).map_err(|e| ChunkError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Extract and chunk a document.
///
/// Extraction is CPU-bound, so it runs on the blocking pool and is bounded
/// by `timeout`. A panic inside the extractor is reported as an error
/// instead of taking the request down with it.
pub async fn load_chunks(
    extractor: Arc<dyn PageExtractor>,
    path: PathBuf,
    chunk_size: usize,
    timeout: Duration,
) -> Result<Vec<Chunk>, ChunkError> {
    let path_str = path.display().to_string();
    tracing::info!("load_chunks: extracting '{path_str}'");

    let handle = tokio::task::spawn_blocking(move || {
        let pages = extractor.extract_pages(&path)?;
        Ok::<_, ChunkError>((pages.len(), chunk_pages(&pages, chunk_size)))
    });

    let (page_count, chunks) = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => return Err(ChunkError::Task(join_err.to_string())),
        Err(_) => {
            return Err(ChunkError::Timeout {
                path: path_str,
                secs: timeout.as_secs(),
            });
        }
    };

    tracing::info!(
        "load_chunks: '{path_str}' produced {} chunks from {page_count} pages",
        chunks.len()
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FixedPages(Vec<String>);

    impl PageExtractor for FixedPages {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, ChunkError> {
            Ok(self.0.clone())
        }
    }

    struct Panicking;

    impl PageExtractor for Panicking {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, ChunkError> {
            panic!("malformed xref table");
        }
    }

    struct Slow;

    impl PageExtractor for Slow {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, ChunkError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = PdfExtractor
            .extract_pages(Path::new("docs/does-not-exist.pdf"))
            .unwrap_err();
        assert!(matches!(err, ChunkError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn test_garbage_file_fails_to_load() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"this is not a pdf").unwrap();
        tmp.flush().unwrap();

        let result = load_chunks(
            Arc::new(PdfExtractor),
            tmp.path().to_path_buf(),
            1000,
            Duration::from_secs(10),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_chunks_labels_pages() {
        let extractor = Arc::new(FixedPages(vec!["a".repeat(1500), "b".repeat(500)]));
        let chunks = load_chunks(extractor, PathBuf::from("x.pdf"), 1000, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].title, "Page 2 Part 1");
    }

    #[tokio::test]
    async fn test_extractor_panic_becomes_error() {
        let result = load_chunks(
            Arc::new(Panicking),
            PathBuf::from("x.pdf"),
            1000,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(ChunkError::Task(_))));
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out() {
        let result = load_chunks(
            Arc::new(Slow),
            PathBuf::from("x.pdf"),
            1000,
            Duration::from_millis(50),
        )
        .await;
        match result {
            Err(ChunkError::Timeout { path, secs }) => {
                assert_eq!(path, "x.pdf");
                assert_eq!(secs, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
