//! Builds factories and commands from plain callables plus a descriptor
//!
//! Command authors supply a [`CommandDescriptor`]: metadata and a callable.
//! The adapter turns it into the matching [`CommandFactory`] variant, selected
//! by [`CommandType`]. Argument handling shared by the two argument-taking
//! variants lives in [`ArgumentResolver`].

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use thiserror::Error;

use crate::commands::factory::{
    ArbitraryArgFactory, BoundedArgFactory, CommandFactory, NoArgFactory,
};
use crate::commands::object::{CommandError, CommandFn, CommandObject};
use crate::messages::Host;

/// Shown by the fallback command when a required argument is missing.
pub const ARG_REQUIRED_MSG: &str = "An argument is required.";

/// Provides the currently valid arguments of a bounded-arg command.
///
/// Returning `None` leaves the previously known set in place.
pub type ArgProvider = Rc<dyn Fn() -> Option<Vec<String>>>;

/// Errors raised while adapting a descriptor. All of them surface at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Unknown command type: {0}")]
    UnknownCommandType(String),
    #[error("command '{command}' is missing `{field}`")]
    MissingField {
        command: String,
        field: &'static str,
    },
    #[error("command name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    NoArg,
    BoundedArg,
    ArbitraryArg,
}

impl CommandType {
    #[must_use]
    pub fn takes_arg(self) -> bool {
        !matches!(self, CommandType::NoArg)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::NoArg => "no-arg",
            CommandType::BoundedArg => "bounded-arg",
            CommandType::ArbitraryArg => "arbitrary-arg",
        }
    }
}

impl FromStr for CommandType {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-arg" => Ok(CommandType::NoArg),
            "bounded-arg" => Ok(CommandType::BoundedArg),
            "arbitrary-arg" => Ok(CommandType::ArbitraryArg),
            other => Err(AdapterError::UnknownCommandType(other.to_string())),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata and callable describing one command
#[derive(Clone)]
pub struct CommandDescriptor {
    pub cmd_type: CommandType,
    pub name: String,
    pub expr: Option<String>,
    pub func: CommandFn,
    pub arg_name: Option<String>,
    pub desc: String,
    pub help: String,
    pub arg_required: Option<bool>,
    pub valid_args: Option<ArgProvider>,
}

impl CommandDescriptor {
    pub fn no_arg(
        name: impl Into<String>,
        desc: impl Into<String>,
        help: impl Into<String>,
        func: impl Fn(&dyn Host, Option<&str>) -> Result<(), CommandError> + 'static,
    ) -> Self {
        Self {
            cmd_type: CommandType::NoArg,
            name: name.into(),
            expr: None,
            func: Rc::new(func),
            arg_name: None,
            desc: desc.into(),
            help: help.into(),
            arg_required: None,
            valid_args: None,
        }
    }

    /// An optional-argument bounded-arg descriptor with expression `name {arg_name}`.
    pub fn bounded_arg(
        name: impl Into<String>,
        arg_name: impl Into<String>,
        desc: impl Into<String>,
        help: impl Into<String>,
        func: impl Fn(&dyn Host, Option<&str>) -> Result<(), CommandError> + 'static,
    ) -> Self {
        Self::with_arg(CommandType::BoundedArg, name.into(), arg_name.into(), desc, help)
            .with_func(func)
    }

    /// An optional-argument arbitrary-arg descriptor with expression `name {arg_name}`.
    pub fn arbitrary_arg(
        name: impl Into<String>,
        arg_name: impl Into<String>,
        desc: impl Into<String>,
        help: impl Into<String>,
        func: impl Fn(&dyn Host, Option<&str>) -> Result<(), CommandError> + 'static,
    ) -> Self {
        Self::with_arg(CommandType::ArbitraryArg, name.into(), arg_name.into(), desc, help)
            .with_func(func)
    }

    fn with_arg(
        cmd_type: CommandType,
        name: String,
        arg_name: String,
        desc: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self {
            cmd_type,
            expr: Some(format!("{name} {{{arg_name}}}")),
            name,
            func: Rc::new(|_: &dyn Host, _: Option<&str>| Ok(())),
            arg_name: Some(arg_name),
            desc: desc.into(),
            help: help.into(),
            arg_required: Some(false),
            valid_args: None,
        }
    }

    fn with_func(
        mut self,
        func: impl Fn(&dyn Host, Option<&str>) -> Result<(), CommandError> + 'static,
    ) -> Self {
        self.func = Rc::new(func);
        self
    }

    #[must_use]
    pub fn arg_required(mut self, required: bool) -> Self {
        self.arg_required = Some(required);
        self
    }

    #[must_use]
    pub fn valid_args(mut self, provider: ArgProvider) -> Self {
        self.valid_args = Some(provider);
        self
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("cmd_type", &self.cmd_type)
            .field("name", &self.name)
            .field("expr", &self.expr)
            .field("arg_name", &self.arg_name)
            .field("desc", &self.desc)
            .field("arg_required", &self.arg_required)
            .field("valid_args", &self.valid_args.is_some())
            .finish_non_exhaustive()
    }
}

/// Argument handling shared by the bounded and arbitrary factories.
///
/// Owns the prefix match and the single translation of `arg_required` into
/// the fallback command.
#[derive(Clone)]
pub struct ArgumentResolver {
    name: String,
    expr: String,
    prefix: String,
    arg_name: String,
    desc: String,
    help: String,
    arg_required: bool,
    func: CommandFn,
}

impl ArgumentResolver {
    /// # Errors
    ///
    /// Returns `AdapterError::MissingField` if `expr`, `arg_name` or
    /// `arg_required` is absent, or `AdapterError::EmptyName` for an empty name.
    pub fn from_descriptor(descriptor: &CommandDescriptor) -> Result<Self, AdapterError> {
        if descriptor.name.is_empty() {
            return Err(AdapterError::EmptyName);
        }
        let missing = |field| AdapterError::MissingField {
            command: descriptor.name.clone(),
            field,
        };
        let expr = descriptor.expr.clone().ok_or_else(|| missing("expr"))?;
        let arg_name = descriptor
            .arg_name
            .clone()
            .ok_or_else(|| missing("arg_name"))?;
        let arg_required = descriptor.arg_required.ok_or_else(|| missing("arg_required"))?;
        Ok(Self {
            prefix: format!("{} ", descriptor.name),
            name: descriptor.name.clone(),
            expr,
            arg_name,
            desc: descriptor.desc.clone(),
            help: descriptor.help.clone(),
            arg_required,
            func: descriptor.func.clone(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn expr(&self) -> &str {
        &self.expr
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.desc
    }

    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    /// The prefix, or the bare name with nothing after it, both count as a match.
    #[must_use]
    pub fn match_len(&self, input: &str) -> Option<usize> {
        if input.starts_with(&self.prefix) {
            Some(self.prefix.len())
        } else if input == self.name {
            Some(self.name.len())
        } else {
            None
        }
    }

    /// Text after the matched literal, verbatim.
    #[must_use]
    pub fn remainder<'a>(&self, input: &'a str) -> &'a str {
        self.match_len(input).map_or("", |len| &input[len..])
    }

    /// Build the command for a postfix, or the fallback when a required one is missing.
    #[must_use]
    pub fn command_for(&self, postfix: &str) -> CommandObject {
        if postfix.is_empty() && self.arg_required {
            return CommandObject::message(&self.name, &self.desc, ARG_REQUIRED_MSG);
        }
        let (description, arg) = if postfix.is_empty() {
            (self.desc.clone(), None)
        } else {
            (
                format!("{} ({}: \u{201c}{postfix}\u{201d})", self.desc, self.arg_name),
                Some(postfix.to_string()),
            )
        };
        CommandObject::from_fn(&self.name, description, &self.help, self.func.clone(), arg)
    }
}

/// Build the factory for a descriptor, dispatching on its command type.
///
/// # Errors
///
/// Returns `AdapterError` if the descriptor lacks a field its type requires.
pub fn build_factory(descriptor: &CommandDescriptor) -> Result<Box<dyn CommandFactory>, AdapterError> {
    if descriptor.name.is_empty() {
        return Err(AdapterError::EmptyName);
    }
    Ok(match descriptor.cmd_type {
        CommandType::NoArg => Box::new(NoArgFactory::new(
            &descriptor.name,
            &descriptor.desc,
            &descriptor.help,
            descriptor.func.clone(),
        )),
        CommandType::BoundedArg => Box::new(BoundedArgFactory::new(
            ArgumentResolver::from_descriptor(descriptor)?,
            descriptor.valid_args.clone(),
        )),
        CommandType::ArbitraryArg => Box::new(ArbitraryArgFactory::new(
            ArgumentResolver::from_descriptor(descriptor)?,
        )),
    })
}

/// Build a single command for a descriptor and an optional argument.
///
/// # Errors
///
/// Returns `AdapterError` if the descriptor lacks a field its type requires.
pub fn build_command(
    descriptor: &CommandDescriptor,
    arg: Option<&str>,
) -> Result<CommandObject, AdapterError> {
    match descriptor.cmd_type {
        CommandType::NoArg => Ok(CommandObject::from_fn(
            &descriptor.name,
            &descriptor.desc,
            &descriptor.help,
            descriptor.func.clone(),
            None,
        )),
        CommandType::BoundedArg | CommandType::ArbitraryArg => {
            Ok(ArgumentResolver::from_descriptor(descriptor)?.command_for(arg.unwrap_or_default()))
        }
    }
}
