use std::fmt;
use std::process::ExitStatus;
use std::rc::Rc;

use log::{debug, error};
use thiserror::Error;

use crate::messages::Host;

/// Errors raised by the callable behind a command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unable to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{0}")]
    Message(String),
}

/// The callable behind a command. Receives the host and the typed argument, if any.
pub type CommandFn = Rc<dyn Fn(&dyn Host, Option<&str>) -> Result<(), CommandError>>;

enum Action {
    Call { func: CommandFn, arg: Option<String> },
    Display(String),
}

/// A resolved, runnable command.
///
/// Created fresh for every resolution and consumed by [`CommandObject::run`],
/// so an instance can never be run twice.
pub struct CommandObject {
    name: String,
    description: String,
    help: String,
    action: Action,
}

impl CommandObject {
    /// A command that calls `func` with `arg` when run.
    #[must_use]
    pub fn from_fn(
        name: impl Into<String>,
        description: impl Into<String>,
        help: impl Into<String>,
        func: CommandFn,
        arg: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            help: help.into(),
            action: Action::Call { func, arg },
        }
    }

    /// A command whose only effect is displaying `message`.
    #[must_use]
    pub fn message(
        name: impl Into<String>,
        description: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            help: String::new(),
            action: Action::Display(message.into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    /// The argument the callable will receive, if this command calls one.
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        match &self.action {
            Action::Call { arg, .. } => arg.as_deref(),
            Action::Display(_) => None,
        }
    }

    /// Run the command. Failures are logged and shown on the host, never propagated.
    pub fn run(self, host: &dyn Host) {
        match self.action {
            Action::Call { func, arg } => {
                debug!("Running command '{}' (arg: {arg:?})", self.name);
                if let Err(e) = func(host, arg.as_deref()) {
                    error!("Command '{}' failed: {e}", self.name);
                    host.display_message(&format!("{} failed: {e}", self.name));
                }
            }
            Action::Display(message) => host.display_message(&message),
        }
    }
}

impl fmt::Debug for CommandObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandObject")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("argument", &self.argument())
            .finish_non_exhaustive()
    }
}
