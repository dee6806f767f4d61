use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::plan::MotionSequence;
use crate::transport::{Command, Transport};

/// Anything that accepts actuation commands.
pub trait ActuatorSink: Send {
    /// Deliver one command. `false` means it did not reach the device.
    fn send_command(&mut self, command: &Command) -> bool;
}

impl ActuatorSink for Transport {
    fn send_command(&mut self, command: &Command) -> bool {
        self.send(command)
    }
}

/// Pause between steps. Swappable so tests can record instead of sleeping.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequencerError {
    /// A sequence is already executing.
    Busy { running: String },
    /// The worker thread could not be started.
    Spawn(String),
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerError::Busy { running } => {
                write!(f, "sequencer busy: '{}' is still running", running)
            }
            SequencerError::Spawn(reason) => write!(f, "sequencer spawn failed: {}", reason),
        }
    }
}

impl std::error::Error for SequencerError {}

/// Outcome of one completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub sent: usize,
    pub failed: Vec<String>,
}

impl SequenceReport {
    pub fn all_sent(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Clears the running flag when dropped, on every exit path of the worker.
struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Runs motion sequences on a background thread, one at a time.
#[derive(Clone)]
pub struct Sequencer {
    running: Arc<AtomicBool>,
    current: Arc<Mutex<String>>,
    sleeper: Sleeper,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(std::thread::sleep))
    }

    pub fn with_sleeper(sleeper: Sleeper) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(String::new())),
            sleeper,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start `sequence` against `sink` and return immediately.
    ///
    /// Rejected with `Busy` while another run is executing; requests are
    /// never queued.
    pub fn run<S>(
        &self,
        sequence: MotionSequence,
        sink: Arc<Mutex<S>>,
    ) -> Result<SequenceHandle, SequencerError>
    where
        S: ActuatorSink + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let running = self
                .current
                .lock()
                .map(|name| name.clone())
                .unwrap_or_default();
            log::warn!(
                "sequence '{}' rejected: '{}' already running",
                sequence.name(),
                running
            );
            return Err(SequencerError::Busy { running });
        }
        let guard = RunGuard {
            running: self.running.clone(),
        };
        if let Ok(mut current) = self.current.lock() {
            *current = sequence.name().to_string();
        }

        let name = sequence.name().to_string();
        let sleeper = self.sleeper.clone();
        let join = std::thread::Builder::new()
            .name(format!("sequence-{}", name))
            .spawn(move || {
                let _guard = guard;
                execute(&sequence, &sink, sleeper.as_ref())
            })
            .map_err(|err| SequencerError::Spawn(err.to_string()))?;

        Ok(SequenceHandle {
            name,
            join: Some(join),
        })
    }
}

fn execute<S: ActuatorSink>(
    sequence: &MotionSequence,
    sink: &Mutex<S>,
    sleep: &(dyn Fn(Duration) + Send + Sync),
) -> SequenceReport {
    let total = sequence.len();
    log::info!("sequence '{}' started ({} steps)", sequence.name(), total);

    let mut report = SequenceReport::default();
    for (i, step) in sequence.steps().iter().enumerate() {
        log::info!(
            "[{}/{}] {}: {:?}",
            i + 1,
            total,
            step.name,
            step.positions
        );
        let delivered = match step.command() {
            Ok(command) => {
                let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                sink.send_command(&command)
            }
            Err(err) => {
                log::error!("{:#}", err);
                false
            }
        };
        if delivered {
            report.sent += 1;
        } else {
            log::warn!("step '{}' was not delivered; continuing", step.name);
            report.failed.push(step.name.clone());
        }
        sleep(step.delay);
    }

    log::info!(
        "sequence '{}' complete: {} sent, {} failed",
        sequence.name(),
        report.sent,
        report.failed.len()
    );
    report
}

/// Handle to an in-flight run.
#[derive(Debug)]
pub struct SequenceHandle {
    name: String,
    join: Option<JoinHandle<SequenceReport>>,
}

impl SequenceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Wait for the run to end.
    pub fn join(mut self) -> Result<SequenceReport> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("sequence '{}' worker panicked", self.name)),
            None => Ok(SequenceReport::default()),
        }
    }
}
