//! The host side of a command: message display, selection and URL opening

use std::collections::VecDeque;
use std::process::Command as ProcessCommand;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::commands::object::CommandError;

const MAX_MESSAGES: usize = 1000;

/// Platform services available to running commands
pub trait Host {
    /// Show a short message to the user.
    fn display_message(&self, message: &str);

    /// Text currently selected by the user, if the platform can tell.
    fn selected_text(&self) -> Option<String> {
        None
    }

    /// Open a URL in the user's browser.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` if the platform opener cannot be started.
    fn open_url(&self, url: &str) -> Result<(), CommandError>;
}

/// Host for the terminal front end: prints messages and opens URLs with the platform opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHost;

impl ConsoleHost {
    fn opener() -> &'static str {
        if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(windows) {
            "explorer"
        } else {
            "xdg-open"
        }
    }
}

impl Host for ConsoleHost {
    fn display_message(&self, message: &str) {
        info!("Message: {message}");
        println!("{message}");
    }

    fn open_url(&self, url: &str) -> Result<(), CommandError> {
        let opener = Self::opener();
        debug!("Opening {url} with {opener}");
        spawn_reaped(opener, url).map(drop)
    }
}

/// Start `program` with `arg` and wait for it on a detached thread so the
/// child is reaped without blocking the caller.
fn spawn_reaped(program: &str, arg: &str) -> Result<JoinHandle<()>, CommandError> {
    let spawn_error = |source| CommandError::Spawn {
        command: program.to_string(),
        source,
    };
    let mut child = ProcessCommand::new(program)
        .arg(arg)
        .spawn()
        .map_err(spawn_error)?;
    let name = program.to_string();
    std::thread::Builder::new()
        .name("hark-opener".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => warn!("{name} exited with {status}"),
            Ok(_) => {}
            Err(e) => warn!("Unable to wait for {name}: {e}"),
        })
        .map_err(spawn_error)
}

/// Host that records everything it is asked to do.
///
/// Cloning shares the underlying buffers.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    messages: Arc<Mutex<VecDeque<String>>>,
    opened: Arc<Mutex<Vec<String>>>,
    selection: Arc<Mutex<Option<String>>>,
}

impl RecordingHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_selection(&self, text: Option<&str>) {
        *self.selection.lock() = text.map(str::to_string);
    }

    /// Returns a snapshot of all displayed messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn last_message(&self) -> Option<String> {
        self.messages.lock().back().cloned()
    }

    #[must_use]
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
        self.opened.lock().clear();
    }
}

impl Host for RecordingHost {
    fn display_message(&self, message: &str) {
        let mut messages = self.messages.lock();
        if messages.len() >= MAX_MESSAGES {
            messages.pop_front();
        }
        messages.push_back(message.to_string());
    }

    fn selected_text(&self) -> Option<String> {
        self.selection.lock().clone()
    }

    fn open_url(&self, url: &str) -> Result<(), CommandError> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}
