use log::{debug, warn};

use crate::adapter::{ArgProvider, ArgumentResolver};
use crate::commands::object::{CommandFn, CommandObject};

/// A pattern that typed input is matched against.
///
/// Matching is case-sensitive. A factory reports how many bytes of the input
/// its literal covers so the registry can prefer the longest match.
pub trait CommandFactory {
    /// Unique command name, e.g. `open`.
    fn name(&self) -> &str;

    /// Human-readable pattern, e.g. `open {item}`.
    fn expr(&self) -> &str;

    /// Literal stem matched before any argument text.
    fn prefix(&self) -> &str;

    fn description(&self) -> &str;

    fn help(&self) -> &str;

    /// Length of the literal this factory matched, or `None` if it does not match.
    fn match_len(&self, input: &str) -> Option<usize>;

    fn matches(&self, input: &str) -> bool {
        self.match_len(input).is_some()
    }

    /// Refresh any dynamic state before matching or resolving.
    fn update(&mut self) {}

    /// Currently valid arguments, for factories that have a bounded set.
    fn postfixes(&self) -> Option<&[String]> {
        None
    }

    /// Build a fresh command for `input`. Callers check [`CommandFactory::matches`] first.
    fn resolve(&self, input: &str) -> CommandObject;
}

/// Matches its name exactly and takes no argument.
pub struct NoArgFactory {
    name: String,
    description: String,
    help: String,
    func: CommandFn,
}

impl NoArgFactory {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        help: impl Into<String>,
        func: CommandFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            help: help.into(),
            func,
        }
    }
}

impl CommandFactory for NoArgFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn expr(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn help(&self) -> &str {
        &self.help
    }

    fn match_len(&self, input: &str) -> Option<usize> {
        (input == self.name).then_some(self.name.len())
    }

    fn resolve(&self, _input: &str) -> CommandObject {
        CommandObject::from_fn(
            &self.name,
            &self.description,
            &self.help,
            self.func.clone(),
            None,
        )
    }
}

/// Prefix factory whose argument comes from a dynamically refreshed set.
///
/// The set drives suggestions only: a typed argument outside the set is
/// still passed through on resolve.
pub struct BoundedArgFactory {
    resolver: ArgumentResolver,
    provider: Option<ArgProvider>,
    postfixes: Vec<String>,
}

impl BoundedArgFactory {
    #[must_use]
    pub fn new(resolver: ArgumentResolver, provider: Option<ArgProvider>) -> Self {
        Self {
            resolver,
            provider,
            postfixes: Vec::new(),
        }
    }
}

impl CommandFactory for BoundedArgFactory {
    fn name(&self) -> &str {
        self.resolver.name()
    }

    fn expr(&self) -> &str {
        self.resolver.expr()
    }

    fn prefix(&self) -> &str {
        self.resolver.prefix()
    }

    fn description(&self) -> &str {
        self.resolver.description()
    }

    fn help(&self) -> &str {
        self.resolver.help()
    }

    fn match_len(&self, input: &str) -> Option<usize> {
        self.resolver.match_len(input)
    }

    fn update(&mut self) {
        let Some(provider) = &self.provider else {
            return;
        };
        match provider() {
            Some(args) => {
                debug!("Refreshed {} arguments for '{}'", args.len(), self.name());
                self.postfixes = args;
            }
            None => warn!(
                "Argument provider for '{}' returned nothing, keeping {} previous arguments",
                self.name(),
                self.postfixes.len()
            ),
        }
    }

    fn postfixes(&self) -> Option<&[String]> {
        Some(&self.postfixes)
    }

    fn resolve(&self, input: &str) -> CommandObject {
        self.resolver.command_for(self.resolver.remainder(input))
    }
}

/// Prefix factory whose argument is free text.
pub struct ArbitraryArgFactory {
    resolver: ArgumentResolver,
}

impl ArbitraryArgFactory {
    #[must_use]
    pub fn new(resolver: ArgumentResolver) -> Self {
        Self { resolver }
    }
}

impl CommandFactory for ArbitraryArgFactory {
    fn name(&self) -> &str {
        self.resolver.name()
    }

    fn expr(&self) -> &str {
        self.resolver.expr()
    }

    fn prefix(&self) -> &str {
        self.resolver.prefix()
    }

    fn description(&self) -> &str {
        self.resolver.description()
    }

    fn help(&self) -> &str {
        self.resolver.help()
    }

    fn match_len(&self, input: &str) -> Option<usize> {
        self.resolver.match_len(input)
    }

    fn resolve(&self, input: &str) -> CommandObject {
        self.resolver.command_for(self.resolver.remainder(input))
    }
}
