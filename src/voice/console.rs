//! Typed dictation
//!
//! A recognizer that treats each line typed on stdin as an utterance, for
//! running without a microphone. It honours the same silence timeouts as
//! microphone dictation and ends cleanly at end of input.

use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::session::{CompletionCause, DictationSettings, Recognizer, RecognizerFactory, RecognizerSink};
use crate::Result;

/// Line source shared by successive console recognizers
#[derive(Clone)]
pub struct ConsoleInput {
    lines: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl ConsoleInput {
    /// Read lines from stdin in the background
    #[must_use]
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read stdin");
                        break;
                    }
                }
            }
        });

        Self::from_channel(rx)
    }

    /// Use an existing channel as the line source
    #[must_use]
    pub fn from_channel(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(rx)),
        }
    }
}

impl RecognizerFactory for ConsoleInput {
    fn create(
        &mut self,
        settings: &DictationSettings,
        sink: RecognizerSink,
    ) -> Result<Box<dyn Recognizer>> {
        Ok(Box::new(ConsoleDictation {
            lines: Arc::clone(&self.lines),
            settings: *settings,
            sink,
            worker: None,
        }))
    }
}

/// One console recognition run
pub struct ConsoleDictation {
    lines: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    settings: DictationSettings,
    sink: RecognizerSink,
    worker: Option<JoinHandle<()>>,
}

impl Recognizer for ConsoleDictation {
    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let lines = Arc::clone(&self.lines);
        let settings = self.settings;
        let sink = self.sink.clone();

        self.worker = Some(tokio::spawn(async move {
            let mut lines = lines.lock().await;
            let mut timeout = settings.initial_silence_timeout;

            loop {
                match tokio::time::timeout(timeout, lines.recv()).await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            sink.result(line, 1.0);
                            timeout = settings.auto_silence_timeout;
                        }
                    }
                    Ok(None) => {
                        sink.completed(CompletionCause::Complete);
                        break;
                    }
                    Err(_) => {
                        sink.completed(CompletionCause::Timeout);
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for ConsoleDictation {
    fn drop(&mut self) {
        self.stop();
    }
}
