// speech.rs: Text-to-speech side channel. Every analysis result is read
// aloud; a new submission silences whatever is still being spoken.

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Failed to start speech command {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

#[async_trait]
pub trait Speaker: Send + Sync {
    /// Start speaking `text`. Returns once the utterance has started.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Cut off the current utterance, if any.
    async fn stop(&self);
}

/// Speaks through an external program such as `espeak` or `say`.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let mut current = self.current.lock().await;
        if let Some(mut child) = current.take() {
            let _ = child.kill().await;
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                command: self.program.clone(),
                source,
            })?;
        *current = Some(child);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(mut child) = self.current.lock().await.take() {
            if let Err(e) = child.kill().await {
                log::debug!("Speech process already gone: {}", e);
            }
        }
    }
}

/// No audio output; results are only printed.
pub struct SilentSpeaker;

#[async_trait]
impl Speaker for SilentSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        log::debug!("(silent) {}", text);
        Ok(())
    }

    async fn stop(&self) {}
}
