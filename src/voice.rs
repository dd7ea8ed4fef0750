//! Speech output, serialized through one worker thread.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Anything that can say a sentence. Calls may block until playback ends.
pub trait Speaker: Send {
    fn say(&mut self, text: &str) -> Result<()>;
}

/// Runs an external TTS program once per utterance, e.g. `espeak "text"`.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn say(&mut self, text: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run speech command `{}`", self.program))?;
        if !status.success() {
            anyhow::bail!("Speech command `{}` exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// Writes utterances to the log instead of playing them.
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn say(&mut self, text: &str) -> Result<()> {
        info!("Speaking: {:?}", text);
        Ok(())
    }
}

/// Single-consumer voice queue. A request made while an utterance is still
/// playing is dropped.
pub struct VoiceQueue {
    tx: Option<Sender<String>>,
    busy: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl VoiceQueue {
    pub fn spawn(mut speaker: Box<dyn Speaker>) -> Self {
        let (tx, rx) = mpsc::channel::<String>();
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        let worker = std::thread::spawn(move || {
            while let Ok(text) = rx.recv() {
                if let Err(e) = speaker.say(&text) {
                    warn!("Voice output failed: {:#}", e);
                }
                worker_busy.store(false, Ordering::Release);
            }
            debug!("Voice worker stopped");
        });

        Self {
            tx: Some(tx),
            busy,
            worker: Some(worker),
        }
    }

    /// Queue `text` unless something is already playing. Returns whether it was accepted.
    pub fn request(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("Voice busy, dropping {:?}", text);
            return false;
        }
        match &self.tx {
            Some(tx) if tx.send(text.to_string()).is_ok() => true,
            _ => {
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for VoiceQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after the current utterance.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
