// src/progress.rs

//! Progress events, listeners and cooperative cancellation
//!
//! The orchestrator reports a [`ProgressEvent`] at every checkpoint (between
//! assets, never in the middle of a download). Each registered
//! [`InstallListener`] may answer [`ListenerAction::Cancel`]; a shared
//! [`CancelToken`] is checked at the same points. Either way the current group
//! is aborted and the caller receives [`Error::Cancelled`].
//!
//! Percentages follow a fixed band layout:
//!
//! | Phase | Percent |
//! |-------|---------|
//! | resolution | 0 - 10 |
//! | install / uninstall | 50 - 90 |
//! | cleanup | 98 |
//! | complete | 100 |

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Upper bound of the resolution band
pub const RESOLVE_PERCENT: u8 = 10;
/// Start of the install band
pub const INSTALL_START_PERCENT: u8 = 50;
/// Width of the install band
pub const INSTALL_SPAN_PERCENT: u8 = 40;
pub const CLEANUP_PERCENT: u8 = 98;
pub const COMPLETE_PERCENT: u8 = 100;

/// Phase of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressState {
    Resolving,
    Downloading,
    Installing,
    Uninstalling,
    CleaningUp,
    Complete,
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressState::Resolving => "resolving",
            ProgressState::Downloading => "downloading",
            ProgressState::Installing => "installing",
            ProgressState::Uninstalling => "uninstalling",
            ProgressState::CleaningUp => "cleaning up",
            ProgressState::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One progress checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub state: ProgressState,
    pub percent: u8,
    pub message: String,
    /// Asset the event refers to, if any
    pub asset: Option<String>,
}

impl ProgressEvent {
    pub fn new(state: ProgressState, percent: u8, message: impl Into<String>) -> Self {
        Self {
            state,
            percent: percent.min(COMPLETE_PERCENT),
            message: message.into(),
            asset: None,
        }
    }

    pub fn for_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }
}

/// Percent for step `done` of `total` inside the install band
pub fn install_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return INSTALL_START_PERCENT + INSTALL_SPAN_PERCENT;
    }
    let step = (done.min(total) * INSTALL_SPAN_PERCENT as usize) / total;
    INSTALL_START_PERCENT + step as u8
}

/// What a listener wants after seeing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerAction {
    #[default]
    Continue,
    Cancel,
}

/// Observer of install/uninstall progress
pub trait InstallListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent) -> ListenerAction;
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Fan-out of events to listeners plus the cancel check
#[derive(Default, Clone)]
pub struct ProgressReporter {
    listeners: Vec<Arc<dyn InstallListener>>,
    cancel: CancelToken,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn InstallListener>) {
        self.listeners.push(listener);
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Deliver `event` to every listener; `Err(Cancelled)` if any asked to stop
    pub fn report(&self, event: ProgressEvent) -> Result<()> {
        debug!("[{}%] {}: {}", event.percent, event.state, event.message);
        let mut cancel = false;
        for listener in &self.listeners {
            if listener.on_progress(&event) == ListenerAction::Cancel {
                cancel = true;
            }
        }
        if cancel {
            self.cancel.cancel();
        }
        self.check(&event.message)
    }

    /// `Err(Cancelled)` if cancellation was requested
    pub fn check(&self, during: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled(during.to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("listeners", &self.listeners.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Logs every event at info level
#[derive(Debug, Default)]
pub struct LogListener;

impl InstallListener for LogListener {
    fn on_progress(&self, event: &ProgressEvent) -> ListenerAction {
        match &event.asset {
            Some(asset) => info!("[{:>3}%] {} {}: {}", event.percent, event.state, asset, event.message),
            None => info!("[{:>3}%] {}: {}", event.percent, event.state, event.message),
        }
        ListenerAction::Continue
    }
}

/// Calls a closure for every event
pub struct CallbackListener<F>
where
    F: Fn(&ProgressEvent) -> ListenerAction + Send + Sync,
{
    callback: F,
}

impl<F> CallbackListener<F>
where
    F: Fn(&ProgressEvent) -> ListenerAction + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> InstallListener for CallbackListener<F>
where
    F: Fn(&ProgressEvent) -> ListenerAction + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) -> ListenerAction {
        (self.callback)(event)
    }
}

/// Records events; handy for tests and for summaries
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl InstallListener for RecordingListener {
    fn on_progress(&self, event: &ProgressEvent) -> ListenerAction {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        ListenerAction::Continue
    }
}

/// Terminal progress bar driven by percent
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(u64::from(COMPLETE_PERCENT));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallListener for CliProgress {
    fn on_progress(&self, event: &ProgressEvent) -> ListenerAction {
        self.bar.set_position(u64::from(event.percent));
        let message = match &event.asset {
            Some(asset) => format!("{} {}", event.state, asset),
            None => event.message.clone(),
        };
        self.bar.set_message(message);
        if event.state == ProgressState::Complete {
            self.bar.finish();
        }
        ListenerAction::Continue
    }
}
