//! Append-only transcript file.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use parley_core::conversation::{TranscriptEntry, TranscriptLog};
use parley_types::error::TranscriptLogError;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends each finished conversation to a plain-text file, one rendered
/// block per conversation followed by a blank line.
pub struct FileTranscriptLog {
    path: PathBuf,
    // Serializes appends so blocks never interleave.
    write_lock: Mutex<()>,
}

impl FileTranscriptLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_entry(&self, entry: &TranscriptEntry) -> Result<(), TranscriptLogError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut block = entry.render();
        block.push('\n');
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!(
            conversation_id = %entry.conversation_id,
            path = %self.path.display(),
            "transcript appended"
        );
        Ok(())
    }
}

impl TranscriptLog for FileTranscriptLog {
    fn append<'a>(
        &'a self,
        entry: &'a TranscriptEntry,
    ) -> BoxFuture<'a, Result<(), TranscriptLogError>> {
        Box::pin(self.write_entry(entry))
    }
}

#[cfg(test)]
mod tests {
    use parley_types::conversation::{ConversationId, TranscriptLine};
    use tempfile::TempDir;

    use super::*;

    fn entry(text: &str) -> TranscriptEntry {
        let ada = "ada".into();
        TranscriptEntry {
            conversation_id: ConversationId::new(),
            day: 3,
            hour: 9.5,
            participants: ["Ada".to_string(), "Bo".to_string()],
            lines: vec![TranscriptLine::agent(&ada, "Ada", text)],
        }
    }

    #[tokio::test]
    async fn appends_blocks_in_order() {
        let tmp = TempDir::new().unwrap();
        let log = FileTranscriptLog::new(tmp.path().join("logs/session.log"));

        log.append(&entry("first")).await.unwrap();
        log.append(&entry("second")).await.unwrap();

        let content = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert!(content.starts_with("[D3 09:30] Ada ↔ Bo (1 lines)\n  Ada: first\n\n"));
        let first = content.find("first").unwrap();
        let second = content.find("second").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be opened for appending.
        let log = FileTranscriptLog::new(tmp.path());
        assert!(log.append(&entry("lost")).await.is_err());
    }
}
