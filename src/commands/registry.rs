use std::collections::HashSet;

use log::debug;
use thiserror::Error;

use crate::commands::factory::CommandFactory;
use crate::commands::object::CommandObject;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a command named '{0}' already exists")]
    DuplicateName(String),
}

/// The active set of command factories, in registration order.
///
/// Names are unique. When several factories match an input the one with the
/// longest matched literal wins, and the earliest registered breaks any
/// remaining tie.
#[derive(Default)]
pub struct CommandRegistry {
    factories: Vec<Box<dyn CommandFactory>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if the name is already registered.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) -> Result<(), RegistryError> {
        self.register_all(vec![factory])
    }

    /// Register several factories, all or none.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if any name is already registered
    /// or appears twice in `factories`.
    pub fn register_all(
        &mut self,
        factories: Vec<Box<dyn CommandFactory>>,
    ) -> Result<(), RegistryError> {
        self.ensure_available(factories.iter().map(|f| f.name()))?;
        for factory in factories {
            debug!("Registering command '{}'", factory.expr());
            self.factories.push(factory);
        }
        Ok(())
    }

    /// Check that none of `names` is taken and that they are distinct.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` naming the first clash.
    pub fn ensure_available<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for name in names {
            if self.contains(name) || !seen.insert(name) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn CommandFactory>> {
        let index = self.factories.iter().position(|f| f.name() == name)?;
        debug!("Unregistering command '{name}'");
        Some(self.factories.remove(index))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|f| f.name() == name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn CommandFactory> {
        self.factories
            .iter()
            .find(|f| f.name() == name)
            .map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn CommandFactory> {
        self.factories.iter().map(AsRef::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|f| f.name())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn best_match(&self, input: &str) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (index, factory) in self.factories.iter().enumerate() {
            if let Some(len) = factory.match_len(input)
                && best.is_none_or(|(_, best_len)| len > best_len)
            {
                best = Some((index, len));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Resolve typed input into a fresh command, refreshing the winning factory first.
    pub fn resolve(&mut self, input: &str) -> Option<CommandObject> {
        let index = self.best_match(input)?;
        let factory = &mut self.factories[index];
        factory.update();
        debug!("Resolved '{input}' with '{}'", factory.expr());
        Some(factory.resolve(input))
    }

    /// Completions for typed input.
    ///
    /// Factories whose literal the input already covers contribute their
    /// matching valid arguments. Factories whose name starts with the input
    /// contribute their expression.
    pub fn suggestions(&mut self, input: &str) -> Vec<String> {
        let mut suggestions = Vec::new();
        for factory in &mut self.factories {
            if let Some(len) = factory.match_len(input) {
                factory.update();
                let remainder = &input[len..];
                match factory.postfixes() {
                    Some(postfixes) => suggestions.extend(
                        postfixes
                            .iter()
                            .filter(|p| p.starts_with(remainder))
                            .map(|p| format!("{}{p}", factory.prefix())),
                    ),
                    None => suggestions.push(factory.expr().to_string()),
                }
            } else if factory.name().starts_with(input) {
                suggestions.push(factory.expr().to_string());
            }
        }
        suggestions
    }
}
