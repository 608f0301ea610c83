//! Spoken-alert playback, decoupled from the frame loop by a bounded queue
//! so a slow TTS backend can never stall detection.

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const QUEUE_CAPACITY: usize = 10;

/// Explicitly owned speech worker: construct with `spawn`, hand alerts to
/// `speak`, and `shutdown` when the session ends.
pub struct SpeechService {
    tx: mpsc::Sender<String>,
    worker: JoinHandle<()>,
}

impl SpeechService {
    /// Start the playback worker. `command` is invoked once per alert with
    /// the message as its single argument (espeak-style).
    pub fn spawn(command: String) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(playback_worker(rx, command));
        Self { tx, worker }
    }

    /// Queue a message without blocking; a full queue drops it.
    pub fn speak(&self, message: &str) {
        use mpsc::error::TrySendError;
        match self.tx.try_send(message.to_string()) {
            Ok(()) => tracing::debug!("speech queued: {message}"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("speech queue full, dropping: {message}");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("speech worker gone, dropping: {message}");
            }
        }
    }

    /// Let the worker drain the queue, then stop it.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::warn!("speech worker task failed: {e}");
        }
    }
}

async fn playback_worker(mut rx: mpsc::Receiver<String>, command: String) {
    while let Some(message) = rx.recv().await {
        match Command::new(&command).arg(&message).output().await {
            Ok(output) if output.status.success() => {
                tracing::debug!("spoke: {message}");
            }
            Ok(output) => {
                tracing::warn!("speech command exited with {}: {message}", output.status);
            }
            Err(e) => {
                tracing::warn!("failed to run speech command '{command}': {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_speak_and_shutdown_drain() {
        // `true` ignores its argument and exits 0 on any unix box
        let speech = SpeechService::spawn("true".to_string());
        speech.speak("Please stay engaged!");
        speech.speak("Please focus on the screen!");
        speech.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_command_does_not_panic() {
        let speech = SpeechService::spawn("definitely-not-a-tts-binary".to_string());
        speech.speak("hello");
        speech.shutdown().await;
    }
}
