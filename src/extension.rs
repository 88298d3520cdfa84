//! Extension source format
//!
//! An extension is a YAML document declaring commands. Each command's action
//! is a shell script run with `sh -c`; the typed argument is passed both as
//! `$1` and as the `HARK_ARG` environment variable. Scripts run with the full
//! privileges of the launcher process.
//!
//! ```yaml
//! commands:
//!   - type: bounded-arg
//!     name: open
//!     expr: "open {note}"
//!     arg_name: note
//!     arg_required: true
//!     desc: Opens a note
//!     help: Opens one of the notes in ~/notes
//!     run: xdg-open ~/notes/"$1"
//!     valid_args_cmd: ls ~/notes
//! ```

use std::collections::HashMap;
use std::process::Command as ProcessCommand;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::{AdapterError, ArgProvider, CommandDescriptor, CommandType, build_factory};
use crate::commands::factory::CommandFactory;
use crate::commands::object::{CommandError, CommandFn};
use crate::messages::Host;

/// File suffix every extension must carry.
pub const EXTENSION_SUFFIX: &str = ".yaml";

/// Environment variable holding the typed argument.
pub const ARG_ENV: &str = "HARK_ARG";

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("unable to parse extension: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("command '{0}' is defined more than once")]
    DuplicateCommand(String),
    #[error("command '{0}' sets both `valid_args` and `valid_args_cmd`")]
    ConflictingValidArgs(String),
}

/// Raw command entry as written in an extension file
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExtensionCommand {
    #[serde(rename = "type")]
    pub cmd_type: String,
    pub name: String,
    pub expr: Option<String>,
    pub arg_name: Option<String>,
    pub arg_required: Option<bool>,
    pub desc: String,
    pub help: String,
    pub run: String,
    pub valid_args: Option<Vec<String>>,
    pub valid_args_cmd: Option<String>,
    pub env: Option<HashMap<String, String>>,
}

/// Root of an extension file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ExtensionFile {
    #[serde(default)]
    pub commands: Vec<ExtensionCommand>,
}

impl ExtensionFile {
    /// # Errors
    ///
    /// Returns `ExtensionError::Yaml` if the source is not a valid extension document.
    pub fn parse(source: &str) -> Result<Self, ExtensionError> {
        Ok(serde_yaml::from_str(source)?)
    }
}

impl TryFrom<ExtensionCommand> for CommandDescriptor {
    type Error = ExtensionError;

    fn try_from(raw: ExtensionCommand) -> Result<Self, Self::Error> {
        let cmd_type: CommandType = raw.cmd_type.parse()?;
        let valid_args = match (raw.valid_args, raw.valid_args_cmd) {
            (Some(_), Some(_)) => return Err(ExtensionError::ConflictingValidArgs(raw.name)),
            (Some(args), None) => Some(static_args(args)),
            (None, Some(script)) => Some(script_args(script)),
            (None, None) => None,
        };
        if valid_args.is_some() && cmd_type != CommandType::BoundedArg {
            warn!(
                "Command '{}' is {cmd_type}, ignoring its valid arguments",
                raw.name
            );
        }
        Ok(CommandDescriptor {
            cmd_type,
            func: shell_fn(raw.run, raw.env.unwrap_or_default()),
            name: raw.name,
            expr: raw.expr,
            arg_name: raw.arg_name,
            desc: raw.desc,
            help: raw.help,
            arg_required: raw.arg_required,
            valid_args,
        })
    }
}

/// Parse extension source into descriptors.
///
/// # Errors
///
/// Returns `ExtensionError` if the document does not parse, a command has an
/// unknown type, or two commands share a name.
pub fn descriptors(source: &str) -> Result<Vec<CommandDescriptor>, ExtensionError> {
    let file = ExtensionFile::parse(source)?;
    let mut names = Vec::with_capacity(file.commands.len());
    for command in &file.commands {
        if names.contains(&command.name.as_str()) {
            return Err(ExtensionError::DuplicateCommand(command.name.clone()));
        }
        names.push(command.name.as_str());
    }
    file.commands
        .into_iter()
        .map(CommandDescriptor::try_from)
        .collect()
}

/// Parse extension source and adapt every command into a factory.
///
/// # Errors
///
/// Returns `ExtensionError` if parsing fails or any command cannot be adapted.
pub fn load(source: &str) -> Result<Vec<Box<dyn CommandFactory>>, ExtensionError> {
    let factories = descriptors(source)?
        .iter()
        .map(build_factory)
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Loaded extension with {} commands", factories.len());
    Ok(factories)
}

fn shell_fn(script: String, env: HashMap<String, String>) -> CommandFn {
    Rc::new(move |host: &dyn Host, arg: Option<&str>| {
        let mut command = ProcessCommand::new("sh");
        command.arg("-c").arg(&script).arg("hark").envs(&env);
        if let Some(arg) = arg {
            command.arg(arg).env(ARG_ENV, arg);
        }
        debug!("Running '{script}' (arg: {arg:?})");
        let output = command.output().map_err(|source| CommandError::Spawn {
            command: script.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                command: script.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            host.display_message(stdout);
        }
        Ok(())
    })
}

fn static_args(args: Vec<String>) -> ArgProvider {
    Rc::new(move || Some(args.clone()))
}

fn script_args(script: String) -> ArgProvider {
    Rc::new(move || {
        let output = match ProcessCommand::new("sh").arg("-c").arg(&script).output() {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!("Argument script '{script}' exited with {}", output.status);
                return None;
            }
            Err(e) => {
                warn!("Unable to run argument script '{script}': {e}");
                return None;
            }
        };
        Some(
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    })
}
