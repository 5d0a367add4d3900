//! Audio pipeline: download, transcode, scratch-file ownership.
//!
//! One pipeline invocation owns its scratch artifacts exclusively; the
//! correlation id (the attachment's unique file id) keys both paths, and
//! the [`ScratchAudio`] guard removes them on every exit path. Release is
//! idempotent: a missing file during cleanup is success.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{BotError, Result};

/// Reject audio whose declared size exceeds the configured maximum.
/// Runs before any network transfer.
pub fn check_size(declared: u64, max: u64) -> Result<()> {
    if declared > max {
        return Err(BotError::AudioTooLarge {
            size: declared,
            max,
        });
    }
    Ok(())
}

/// Reject audio whose declared MIME type is not in the allow-list.
/// Attachments without format metadata pass.
pub fn check_mime(mime: Option<&str>, allowed: &[String]) -> Result<()> {
    match mime {
        Some(mime) if !allowed.iter().any(|m| m == mime) => Err(BotError::UnsupportedFormat {
            mime: mime.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Downloads a remote audio resource to a local path.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Streaming HTTP download; never buffers the whole payload in memory.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AudioFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BotError::Download {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(BotError::Download {
                message: format!("unexpected status {}", response.status()),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BotError::Download {
                message: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Converts downloaded audio into the canonical recognition format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` to mono 16 kHz linear-PCM WAV at `output`.
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<()>;
}

/// ffmpeg subprocess transcoder.
pub struct FfmpegTranscoder;

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        let result = tokio::process::Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ac", "1", "-ar", "16000", "-f", "wav"])
            .arg(output)
            .output()
            .await
            .map_err(|e| BotError::Transcode {
                message: format!("failed to spawn ffmpeg: {}", e),
            })?;

        if !result.status.success() {
            let stderr: String = String::from_utf8_lossy(&result.stderr)
                .trim()
                .chars()
                .take(240)
                .collect();
            return Err(BotError::Transcode { message: stderr });
        }
        Ok(())
    }
}

/// Scratch artifacts of one pipeline invocation: the raw download and the
/// normalized WAV. Owned exclusively by that invocation.
#[derive(Debug)]
pub struct ScratchAudio {
    original: PathBuf,
    wav: PathBuf,
}

impl ScratchAudio {
    fn new(original: PathBuf, wav: PathBuf) -> Self {
        ScratchAudio { original, wav }
    }

    /// Path of the normalized audio, ready for the speech backend.
    pub fn wav_path(&self) -> &Path {
        &self.wav
    }

    /// Remove both artifacts. Idempotent; a missing file is success.
    pub async fn release(&self) {
        remove_quiet(&self.original).await;
        remove_quiet(&self.wav).await;
    }
}

impl Drop for ScratchAudio {
    fn drop(&mut self) {
        // Backstop for cancelled or panicked invocations. The normal paths
        // call release() first, after which these are no-ops.
        let _ = std::fs::remove_file(&self.original);
        let _ = std::fs::remove_file(&self.wav);
    }
}

async fn remove_quiet(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
    }
}

/// Download + transcode pipeline over a scratch directory.
pub struct AudioPipeline {
    scratch_dir: PathBuf,
    fetcher: Arc<dyn AudioFetcher>,
    transcoder: Arc<dyn Transcoder>,
}

impl AudioPipeline {
    pub fn new(
        scratch_dir: PathBuf,
        fetcher: Arc<dyn AudioFetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        AudioPipeline {
            scratch_dir,
            fetcher,
            transcoder,
        }
    }

    /// Fetch the remote resource and normalize it for recognition.
    ///
    /// On failure both scratch files are removed before the error
    /// propagates; on success the caller owns the returned guard and must
    /// release it when done with the WAV.
    pub async fn prepare(&self, url: &str, correlation_id: &str) -> Result<ScratchAudio> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let scratch = ScratchAudio::new(
            self.scratch_dir.join(format!("{}_original", correlation_id)),
            self.scratch_dir.join(format!("{}.wav", correlation_id)),
        );

        debug!("Downloading audio for {}", correlation_id);
        if let Err(err) = self.fetcher.fetch(url, &scratch.original).await {
            scratch.release().await;
            return Err(err);
        }

        debug!("Transcoding audio for {}", correlation_id);
        if let Err(err) = self
            .transcoder
            .to_wav(&scratch.original, &scratch.wav)
            .await
        {
            scratch.release().await;
            return Err(err);
        }

        Ok(scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes fixed bytes to the destination instead of downloading.
    struct StubFetcher {
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new() -> Arc<Self> {
            Arc::new(StubFetcher {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AudioFetcher for StubFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(dest, b"OggS fake voice data").await?;
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl AudioFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<()> {
            // Simulate a partial download before the connection drops.
            tokio::fs::write(dest, b"partial").await?;
            Err(BotError::Download {
                message: "connection reset".to_string(),
            })
        }
    }

    /// Pretends to transcode by copying the input.
    struct CopyTranscoder;

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn to_wav(&self, input: &Path, output: &Path) -> Result<()> {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct FailingTranscoder;

    #[async_trait]
    impl Transcoder for FailingTranscoder {
        async fn to_wav(&self, _input: &Path, output: &Path) -> Result<()> {
            // Leave a half-written output behind, as ffmpeg can.
            tokio::fs::write(output, b"garbage").await?;
            Err(BotError::Transcode {
                message: "exited with code 1".to_string(),
            })
        }
    }

    fn scratch_file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
    }

    #[test]
    fn test_size_gate() {
        assert!(check_size(1000, 2000).is_ok());
        assert!(check_size(2000, 2000).is_ok());
        let err = check_size(2001, 2000).unwrap_err();
        assert!(matches!(err, BotError::AudioTooLarge { .. }));
    }

    #[test]
    fn test_mime_gate() {
        let allowed = vec!["audio/ogg".to_string(), "audio/wav".to_string()];
        assert!(check_mime(Some("audio/ogg"), &allowed).is_ok());
        assert!(check_mime(None, &allowed).is_ok());
        let err = check_mime(Some("video/mp4"), &allowed).unwrap_err();
        assert!(matches!(err, BotError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_prepare_success_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AudioPipeline::new(
            dir.path().to_path_buf(),
            StubFetcher::new(),
            Arc::new(CopyTranscoder),
        );

        let scratch = pipeline.prepare("http://example/file", "abc123").await.unwrap();
        assert!(scratch.wav_path().exists());
        assert_eq!(scratch_file_count(dir.path()), 2);

        scratch.release().await;
        assert_eq!(scratch_file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_transcode_failure_leaves_no_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AudioPipeline::new(
            dir.path().to_path_buf(),
            StubFetcher::new(),
            Arc::new(FailingTranscoder),
        );

        let err = pipeline.prepare("http://example/file", "abc123").await.unwrap_err();
        assert!(matches!(err, BotError::Transcode { .. }));
        assert_eq!(scratch_file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_failure_cleans_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AudioPipeline::new(
            dir.path().to_path_buf(),
            Arc::new(FailingFetcher),
            Arc::new(CopyTranscoder),
        );

        let err = pipeline.prepare("http://example/file", "abc123").await.unwrap_err();
        assert!(matches!(err, BotError::Download { .. }));
        assert_eq!(scratch_file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AudioPipeline::new(
            dir.path().to_path_buf(),
            StubFetcher::new(),
            Arc::new(CopyTranscoder),
        );

        let scratch = pipeline.prepare("http://example/file", "abc123").await.unwrap();
        scratch.release().await;
        // Second release and release over missing files must not panic.
        scratch.release().await;
        assert_eq!(scratch_file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_release_on_never_created_paths() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchAudio::new(
            dir.path().join("ghost_original"),
            dir.path().join("ghost.wav"),
        );
        scratch.release().await;
        scratch.release().await;
    }

    #[tokio::test]
    async fn test_drop_backstop_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AudioPipeline::new(
            dir.path().to_path_buf(),
            StubFetcher::new(),
            Arc::new(CopyTranscoder),
        );

        {
            let _scratch = pipeline.prepare("http://example/file", "abc123").await.unwrap();
            assert_eq!(scratch_file_count(dir.path()), 2);
            // Dropped without an explicit release.
        }
        assert_eq!(scratch_file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(AudioPipeline::new(
            dir.path().to_path_buf(),
            StubFetcher::new(),
            Arc::new(CopyTranscoder),
        ));

        let a = pipeline.prepare("http://example/a", "id-a");
        let b = pipeline.prepare("http://example/b", "id-b");
        let (a, b) = tokio::join!(a, b);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.wav_path(), b.wav_path());

        a.release().await;
        assert!(b.wav_path().exists());
        b.release().await;
        assert_eq!(scratch_file_count(dir.path()), 0);
    }
}
