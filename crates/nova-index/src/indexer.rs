use std::path::PathBuf;
use std::sync::Arc;

use nova_core::{digest_file, CompileCommand, IncludeGraphNode, IndexResult};

use crate::{ContentFilter, Extractor, IndexError, ShardVersionTable, VersionSnapshot};

/// The outcome of compiling one translation unit, ready for the
/// [`crate::Merger`].
#[derive(Debug)]
pub struct IndexedUnit {
    pub main_file: PathBuf,
    pub result: IndexResult,
    /// Versions the compile was filtered against.
    pub versions: VersionSnapshot,
}

impl IndexedUnit {
    pub fn had_errors(&self) -> bool {
        self.result.had_errors
    }
}

/// Compiles translation units through the [`Extractor`].
pub struct Indexer {
    extractor: Arc<dyn Extractor>,
    versions: Arc<ShardVersionTable>,
}

impl Indexer {
    pub fn new(extractor: Arc<dyn Extractor>, versions: Arc<ShardVersionTable>) -> Self {
        Self {
            extractor,
            versions,
        }
    }

    /// Compile `command`, skipping collection for files whose recorded version
    /// is current and clean.
    ///
    /// Errors are not retried: the translation unit is picked up again by the
    /// next change notification that touches it.
    pub fn index(&self, command: &CompileCommand) -> Result<IndexedUnit, IndexError> {
        let main_file = command.absolute_path();
        if command.filename.as_os_str().is_empty() {
            return Err(IndexError::InvalidCommand {
                path: main_file,
                reason: "empty file name".to_string(),
            });
        }

        let digest = digest_file(&main_file).map_err(|source| IndexError::ReadSource {
            path: main_file.clone(),
            source,
        })?;

        // One snapshot per translation unit instead of a lock per visited file.
        let versions = self.versions.snapshot();
        tracing::debug!(
            target: "nova.index",
            path = %main_file.display(),
            %digest,
            "indexing translation unit"
        );

        let filter = ContentFilter::new(versions.clone());
        let mut result = self.extractor.extract(command, &filter)?;
        result.command = Some(command.clone());

        let main_node = result
            .sources
            .entry(main_file.clone())
            .or_insert_with(|| IncludeGraphNode::new(digest));
        main_node.flags.is_tu = true;

        if result.had_errors {
            tracing::warn!(
                target: "nova.index",
                path = %main_file.display(),
                "failed to compile, index may be incomplete"
            );
            for node in result.sources.values_mut() {
                node.flags.had_errors = true;
            }
        }

        tracing::info!(
            target: "nova.index",
            path = %main_file.display(),
            symbols = result.symbols.len(),
            refs = result.refs.len(),
            files = result.sources.len(),
            "indexed translation unit"
        );

        Ok(IndexedUnit {
            main_file,
            result,
            versions,
        })
    }
}
