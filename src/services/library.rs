use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::chunker::{Chunk, ChunkError};
use super::pdf::{PageExtractor, load_chunks};
use crate::config::{DocumentsConfig, LocationConfig};

/// The fixed set of departure locations and the schedule behind each.
#[derive(Clone)]
pub struct ScheduleLibrary {
    locations: Vec<LocationConfig>,
    default_location: String,
    chunk_size: usize,
    extract_timeout: Duration,
    extractor: Arc<dyn PageExtractor>,
}

/// Chunks loaded for one location.
#[derive(Debug, Clone)]
pub struct LoadedSchedule {
    pub location: String,
    pub chunks: Arc<[Chunk]>,
}

impl ScheduleLibrary {
    pub fn new(config: &DocumentsConfig, extractor: Arc<dyn PageExtractor>) -> Self {
        Self {
            locations: config.locations.clone(),
            default_location: config.default_location.clone(),
            chunk_size: config.chunk_size,
            extract_timeout: Duration::from_secs(config.extract_timeout_secs),
            extractor,
        }
    }

    pub fn locations(&self) -> &[LocationConfig] {
        &self.locations
    }

    pub fn default_location(&self) -> &str {
        &self.default_location
    }

    /// Look up a location by name, falling back to the default one.
    pub fn resolve(&self, name: &str) -> &LocationConfig {
        self.find(name)
            .or_else(|| self.find(&self.default_location))
            .unwrap_or_else(|| &self.locations[0])
    }

    fn find(&self, name: &str) -> Option<&LocationConfig> {
        self.locations.iter().find(|l| l.name == name)
    }

    /// Resolve `name` and build a fresh chunk list from its schedule.
    pub async fn load(&self, name: &str) -> Result<LoadedSchedule, ChunkError> {
        let location = self.resolve(name);
        if location.name != name {
            tracing::info!(
                "Unknown location '{name}', using '{}' instead",
                location.name
            );
        }

        let chunks = load_chunks(
            self.extractor.clone(),
            PathBuf::from(&location.path),
            self.chunk_size,
            self.extract_timeout,
        )
        .await?;

        Ok(LoadedSchedule {
            location: location.name.clone(),
            chunks: chunks.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Returns the file name as the only page, so chunks reveal their source.
    struct EchoPath;

    impl PageExtractor for EchoPath {
        fn extract_pages(&self, path: &Path) -> Result<Vec<String>, ChunkError> {
            Ok(vec![path.display().to_string()])
        }
    }

    fn library() -> ScheduleLibrary {
        let config = DocumentsConfig {
            chunk_size: 1000,
            extract_timeout_secs: 5,
            default_location: "Tai Tam Middle School".to_string(),
            locations: vec![
                LocationConfig {
                    name: "Tai Tam Middle School".to_string(),
                    path: "docs/tai-tam.pdf".to_string(),
                },
                LocationConfig {
                    name: "Repulse Bay".to_string(),
                    path: "docs/repulse-bay.pdf".to_string(),
                },
            ],
        };
        ScheduleLibrary::new(&config, Arc::new(EchoPath))
    }

    #[test]
    fn test_resolve_known_location() {
        assert_eq!(library().resolve("Repulse Bay").path, "docs/repulse-bay.pdf");
    }

    #[test]
    fn test_resolve_unknown_falls_back_to_default() {
        let lib = library();
        assert_eq!(lib.resolve("Stanley").name, "Tai Tam Middle School");
        assert_eq!(lib.resolve("").name, "Tai Tam Middle School");
    }

    #[tokio::test]
    async fn test_load_reads_resolved_path() {
        let loaded = library().load("Repulse Bay").await.unwrap();
        assert_eq!(loaded.location, "Repulse Bay");
        assert_eq!(loaded.chunks.len(), 1);
        assert_eq!(loaded.chunks[0].snippet, "docs/repulse-bay.pdf");
    }

    #[tokio::test]
    async fn test_load_unknown_uses_default_document() {
        let loaded = library().load("Tai Tam Bus Schedule").await.unwrap();
        assert_eq!(loaded.location, "Tai Tam Middle School");
        assert_eq!(loaded.chunks[0].snippet, "docs/tai-tam.pdf");
    }
}
