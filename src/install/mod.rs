//! Remote extension install pipeline
//!
//! [`listener`] accepts URLs on a background thread and hands them to the
//! [`queue`]. [`Installer::tick`] runs on the main context, takes at most one
//! URL per call, and fetches, validates, stores and registers it. A slow fetch
//! makes that tick slow; nothing else on the main context runs meanwhile.

pub mod fetch;
pub mod listener;
pub mod queue;

use log::{info, warn};
use thiserror::Error;

use crate::commands::registry::{CommandRegistry, RegistryError};
use crate::extension::{self, EXTENSION_SUFFIX, ExtensionError};
use crate::install::fetch::{Fetch, FetchError};
use crate::install::queue::InstallReceiver;
use crate::messages::Host;
use crate::store::{self, ExtensionStore, StoreError};

/// Fetched bodies need at least this many lines after leading blank ones.
const MIN_LINES: usize = 3;

/// Why an install was rejected. `Display` is the message shown to the user.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Could not install that command")]
    Fetch(#[source] FetchError),
    #[error("There was no command to install!")]
    NoCommand,
    #[error("Could not install {0}: extensions must be {suffix} files", suffix = EXTENSION_SUFFIX)]
    BadFileName(String),
    #[error("You already have a command named {0}")]
    AlreadyInstalled(String),
    #[error("Could not install {file}: {source}")]
    InvalidExtension {
        file: String,
        #[source]
        source: ExtensionError,
    },
    #[error("Could not install {file}: {source}")]
    NameTaken {
        file: String,
        #[source]
        source: RegistryError,
    },
    #[error("Could not install {file}: {source}")]
    Store {
        file: String,
        #[source]
        source: StoreError,
    },
}

/// A successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub file_name: String,
    pub commands: Vec<String>,
}

impl Installed {
    /// Confirmation shown to the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self.commands.as_slice() {
            [] => format!(
                "{} was installed but defines no commands",
                store::short_name(&self.file_name)
            ),
            [name] => format!("{name} is now a command"),
            names => format!("{} are now commands", names.join(", ")),
        }
    }
}

fn has_enough_lines(text: &str) -> bool {
    text.lines()
        .skip_while(|line| line.trim().is_empty())
        .take(MIN_LINES)
        .count()
        == MIN_LINES
}

/// Consumer side of the install queue, owned by the main context.
pub struct Installer {
    receiver: InstallReceiver,
    store: ExtensionStore,
    fetcher: Box<dyn Fetch>,
}

impl Installer {
    #[must_use]
    pub fn new(receiver: InstallReceiver, store: ExtensionStore, fetcher: Box<dyn Fetch>) -> Self {
        Self {
            receiver,
            store,
            fetcher,
        }
    }

    #[must_use]
    pub fn store(&self) -> &ExtensionStore {
        &self.store
    }

    /// Number of URLs waiting to be installed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Install at most one queued URL, reporting the outcome on `host`.
    ///
    /// Returns `None` when the queue was empty.
    pub fn tick(
        &self,
        registry: &mut CommandRegistry,
        host: &dyn Host,
    ) -> Option<Result<Installed, InstallError>> {
        let url = self.receiver.try_pop()?;
        info!("Installing command from {url}");
        let result = self.install_from_url(&url, registry);
        match &result {
            Ok(installed) => {
                info!(
                    "Installed {} ({} commands)",
                    installed.file_name,
                    installed.commands.len()
                );
                host.display_message(&installed.message());
            }
            Err(e) => {
                match e {
                    InstallError::Fetch(source) => warn!("Install from {url} failed: {source}"),
                    other => warn!("Install from {url} rejected: {other}"),
                }
                host.display_message(&e.to_string());
            }
        }
        Some(result)
    }

    /// Fetch, validate, store and register the extension at `url`.
    ///
    /// Nothing is written and nothing is registered unless every check passes.
    ///
    /// # Errors
    ///
    /// Returns the first `InstallError` hit, in pipeline order.
    pub fn install_from_url(
        &self,
        url: &str,
        registry: &mut CommandRegistry,
    ) -> Result<Installed, InstallError> {
        let body = self.fetcher.fetch(url).map_err(InstallError::Fetch)?;
        let text = String::from_utf8_lossy(&body);
        if !has_enough_lines(&text) {
            return Err(InstallError::NoCommand);
        }

        let file_name = store::file_name_from_url(url);
        if !store::is_valid_file_name(&file_name) {
            return Err(InstallError::BadFileName(file_name));
        }
        if self.store.contains(&file_name) {
            return Err(InstallError::AlreadyInstalled(
                store::short_name(&file_name).to_string(),
            ));
        }

        let factories = extension::load(&text).map_err(|source| InstallError::InvalidExtension {
            file: file_name.clone(),
            source,
        })?;
        registry
            .ensure_available(factories.iter().map(|f| f.name()))
            .map_err(|source| InstallError::NameTaken {
                file: file_name.clone(),
                source,
            })?;

        self.store
            .persist(&file_name, &body)
            .map_err(|source| match source {
                StoreError::AlreadyExists(_) => {
                    InstallError::AlreadyInstalled(store::short_name(&file_name).to_string())
                }
                source => InstallError::Store {
                    file: file_name.clone(),
                    source,
                },
            })?;

        let commands = factories.iter().map(|f| f.name().to_string()).collect();
        registry
            .register_all(factories)
            .map_err(|source| InstallError::NameTaken {
                file: file_name.clone(),
                source,
            })?;
        Ok(Installed {
            file_name,
            commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{CommandDescriptor, build_factory};
    use crate::install::queue::{InstallSender, install_queue};
    use crate::messages::RecordingHost;
    use std::collections::HashMap;

    const HELLO: &str = "\
# hello.yaml
commands:
  - {type: no-arg, name: hello, run: echo hello,
     desc: Says hello, help: Prints a greeting}
";

    struct Fixture {
        _dir: tempfile::TempDir,
        sender: InstallSender,
        installer: Installer,
        registry: CommandRegistry,
        host: RecordingHost,
    }

    fn fixture(pages: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtensionStore::open(dir.path().join("commands")).unwrap();
        let pages: HashMap<String, Vec<u8>> = pages
            .iter()
            .map(|(url, body)| ((*url).to_string(), body.as_bytes().to_vec()))
            .collect();
        let fetcher = move |url: &str| -> Result<Vec<u8>, FetchError> {
            pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::UnsupportedScheme("test".to_string()))
        };
        let (sender, receiver) = install_queue();
        Fixture {
            _dir: dir,
            sender,
            installer: Installer::new(receiver, store, Box::new(fetcher)),
            registry: CommandRegistry::new(),
            host: RecordingHost::new(),
        }
    }

    impl Fixture {
        fn tick(&mut self) -> Option<Result<Installed, InstallError>> {
            self.installer.tick(&mut self.registry, &self.host)
        }

        fn stored_files(&self) -> usize {
            std::fs::read_dir(self.installer.store().dir()).unwrap().count()
        }
    }

    #[test]
    fn test_installed_message() {
        let installed = |commands: &[&str]| Installed {
            file_name: "pack.yaml".to_string(),
            commands: commands.iter().map(|c| (*c).to_string()).collect(),
        };
        insta::assert_snapshot!(installed(&["hello"]).message(), @"hello is now a command");
        insta::assert_snapshot!(installed(&["a", "b"]).message(), @"a, b are now commands");
        insta::assert_snapshot!(installed(&[]).message(), @"pack was installed but defines no commands");
    }

    #[test]
    fn test_line_count() {
        assert!(has_enough_lines("a\nb\nc"));
        assert!(has_enough_lines("\n\n  \na\nb\nc\n"));
        assert!(!has_enough_lines("a\nb\n"));
        assert!(!has_enough_lines("\n\n\n\na\nb"));
        assert!(!has_enough_lines(""));
    }

    #[test]
    fn test_empty_queue_tick_is_noop() {
        let mut fx = fixture(&[]);
        assert!(fx.tick().is_none());
        assert!(fx.host.messages().is_empty());
    }

    #[test]
    fn test_install_hello() {
        let url = "https://example.com/cmds/hello.yaml";
        let mut fx = fixture(&[(url, HELLO)]);
        fx.sender.push(url.to_string());

        let installed = fx.tick().unwrap().unwrap();
        assert_eq!(installed.commands, vec!["hello".to_string()]);
        assert_eq!(fx.host.messages(), vec!["hello is now a command".to_string()]);
        assert!(fx.registry.contains("hello"));
        let stored = std::fs::read(fx.installer.store().path_for("hello.yaml")).unwrap();
        assert_eq!(stored, HELLO.as_bytes());
    }

    #[test]
    fn test_one_url_per_tick() {
        let url = "https://example.com/hello.yaml";
        let mut fx = fixture(&[(url, HELLO)]);
        fx.sender.push(url.to_string());
        fx.sender.push(url.to_string());
        assert_eq!(fx.installer.pending(), 2);

        assert!(fx.tick().unwrap().is_ok());
        assert_eq!(fx.installer.pending(), 1);
        match fx.tick().unwrap() {
            Err(InstallError::AlreadyInstalled(name)) => assert_eq!(name, "hello"),
            other => panic!("Expected AlreadyInstalled, got: {other:?}"),
        }
        assert_eq!(
            fx.host.last_message().as_deref(),
            Some("You already have a command named hello")
        );
        assert!(fx.tick().is_none());
    }

    #[test]
    fn test_fetch_failure() {
        let mut fx = fixture(&[]);
        fx.sender.push("https://example.com/missing.yaml".to_string());
        assert!(matches!(fx.tick(), Some(Err(InstallError::Fetch(_)))));
        assert_eq!(
            fx.host.last_message().as_deref(),
            Some("Could not install that command")
        );
        assert_eq!(fx.stored_files(), 0);
    }

    #[test]
    fn test_short_body_writes_nothing() {
        let url = "https://example.com/hello.yaml";
        let mut fx = fixture(&[(url, "commands:\n  - {type: no-arg}\n")]);
        fx.sender.push(url.to_string());
        assert!(matches!(fx.tick(), Some(Err(InstallError::NoCommand))));
        assert_eq!(
            fx.host.last_message().as_deref(),
            Some("There was no command to install!")
        );
        assert_eq!(fx.stored_files(), 0);
    }

    #[test]
    fn test_bad_file_name() {
        let url = "https://example.com/hello.py";
        let mut fx = fixture(&[(url, HELLO)]);
        fx.sender.push(url.to_string());
        match fx.tick().unwrap() {
            Err(InstallError::BadFileName(name)) => assert_eq!(name, "hello.py"),
            other => panic!("Expected BadFileName, got: {other:?}"),
        }
        insta::assert_snapshot!(
            fx.host.last_message().unwrap(),
            @"Could not install hello.py: extensions must be .yaml files"
        );
        assert_eq!(fx.stored_files(), 0);
    }

    #[test]
    fn test_invalid_extension_writes_nothing() {
        let url = "https://example.com/broken.yaml";
        let mut fx = fixture(&[(url, "commands:\n  - type: no-arg\n    name: [oops\n")]);
        fx.sender.push(url.to_string());
        assert!(matches!(
            fx.tick(),
            Some(Err(InstallError::InvalidExtension { .. }))
        ));
        assert!(fx.host.last_message().unwrap().starts_with("Could not install broken.yaml:"));
        assert_eq!(fx.stored_files(), 0);
        assert!(fx.registry.is_empty());
    }

    #[test]
    fn test_name_taken_by_registered_command() {
        let url = "https://example.com/greetings.yaml";
        let mut fx = fixture(&[(url, HELLO)]);
        fx.registry
            .register(build_factory(&CommandDescriptor::no_arg("hello", "", "", |_, _| Ok(()))).unwrap())
            .unwrap();
        fx.sender.push(url.to_string());
        assert!(matches!(fx.tick(), Some(Err(InstallError::NameTaken { .. }))));
        assert_eq!(fx.stored_files(), 0);
    }

    #[test]
    fn test_zero_commands_still_installs() {
        let url = "https://example.com/empty.yaml";
        let mut fx = fixture(&[(url, "# nothing here yet\n# maybe later\ncommands: []\n")]);
        fx.sender.push(url.to_string());
        let installed = fx.tick().unwrap().unwrap();
        assert!(installed.commands.is_empty());
        assert_eq!(fx.stored_files(), 1);
    }

    #[test]
    fn test_multiple_commands_message() {
        let url = "https://example.com/pair.yaml";
        let body = "\
commands:
  - {type: no-arg, name: ping, run: echo pong, desc: Ping, help: ''}
  - {type: arbitrary-arg, name: say, expr: 'say {text}', arg_name: text,
     arg_required: true, run: 'echo \"$1\"', desc: Say, help: ''}
";
        let mut fx = fixture(&[(url, body)]);
        fx.sender.push(url.to_string());
        fx.tick().unwrap().unwrap();
        assert_eq!(
            fx.host.last_message().as_deref(),
            Some("ping, say are now commands")
        );
        assert_eq!(fx.registry.names().collect::<Vec<_>>(), vec!["ping", "say"]);
    }
}
