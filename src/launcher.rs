//! Process-wide launcher context
//!
//! A [`Launcher`] is built once at startup. It owns the command registry, the
//! installer and the listener lifecycle, and is driven from the main context
//! by calling [`Launcher::tick`] periodically and [`Launcher::execute`] for
//! every line the user enters.

use std::net::SocketAddr;

use log::{debug, info, warn};
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::builtin;
use crate::commands::registry::{CommandRegistry, RegistryError};
use crate::config_file::Config;
use crate::extension;
use crate::install::fetch::{Fetch, FetchError, HttpFetcher};
use crate::install::listener::{InstallListener, ListenerError, RunningListener};
use crate::install::queue::{InstallSender, install_queue};
use crate::install::{InstallError, Installed, Installer};
use crate::messages::Host;
use crate::store::{ExtensionStore, StoreError};

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unable to register built-in commands: {0}")]
    Builtin(#[from] AdapterError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

enum ListenerState {
    Idle(InstallSender),
    Running(RunningListener),
}

pub struct Launcher {
    registry: CommandRegistry,
    installer: Installer,
    host: Box<dyn Host>,
    port: u16,
    // `None` only while switching states, or after a failed stop.
    listener: Option<ListenerState>,
}

impl Launcher {
    /// Build a launcher that fetches over HTTP with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `LauncherError` if the store cannot be opened, the HTTP client
    /// cannot be built, or the built-in commands fail to register.
    pub fn new(config: &Config, host: Box<dyn Host>) -> Result<Self, LauncherError> {
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        Self::with_fetcher(config, host, Box::new(fetcher))
    }

    /// Build a launcher with a custom fetcher.
    ///
    /// Built-in commands are registered first, then every installed extension
    /// in file name order. Extensions that fail to load are skipped.
    ///
    /// # Errors
    ///
    /// Returns `LauncherError` if the store cannot be opened or read, or the
    /// built-in commands fail to register.
    pub fn with_fetcher(
        config: &Config,
        host: Box<dyn Host>,
        fetcher: Box<dyn Fetch>,
    ) -> Result<Self, LauncherError> {
        let store = ExtensionStore::open(&config.extension_dir)?;
        let mut registry = CommandRegistry::new();
        registry.register_all(builtin::factories()?)?;
        load_installed(&store, &mut registry)?;

        let (sender, receiver) = install_queue();
        Ok(Self {
            registry,
            installer: Installer::new(receiver, store, fetcher),
            host,
            port: config.port,
            listener: Some(ListenerState::Idle(sender)),
        })
    }

    /// Bind the install listener and start serving.
    ///
    /// Calling this while already listening returns the current address.
    ///
    /// # Errors
    ///
    /// Returns `LauncherError::Listener` if the port cannot be bound or the
    /// thread cannot be spawned.
    pub fn start(&mut self) -> Result<SocketAddr, LauncherError> {
        match self.listener.take() {
            Some(ListenerState::Idle(sender)) => {
                let listener = match InstallListener::bind(self.port) {
                    Ok(listener) => listener,
                    Err(e) => {
                        self.listener = Some(ListenerState::Idle(sender));
                        return Err(e.into());
                    }
                };
                let running = listener.spawn(sender)?;
                let addr = running.local_addr();
                self.listener = Some(ListenerState::Running(running));
                Ok(addr)
            }
            Some(ListenerState::Running(running)) => {
                let addr = running.local_addr();
                self.listener = Some(ListenerState::Running(running));
                Ok(addr)
            }
            None => Err(ListenerError::Panicked.into()),
        }
    }

    /// Stop the install listener. Queued requests stay queued.
    ///
    /// # Errors
    ///
    /// Returns `LauncherError::Listener` if the listener thread panicked. The
    /// listener cannot be restarted afterwards.
    pub fn stop(&mut self) -> Result<(), LauncherError> {
        match self.listener.take() {
            Some(ListenerState::Running(running)) => {
                let sender = running.stop()?;
                self.listener = Some(ListenerState::Idle(sender));
            }
            state => self.listener = state,
        }
        Ok(())
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        matches!(self.listener, Some(ListenerState::Running(_)))
    }

    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Some(ListenerState::Running(running)) => Some(running.local_addr()),
            _ => None,
        }
    }

    /// Process at most one pending install request.
    pub fn tick(&mut self) -> Option<Result<Installed, InstallError>> {
        self.installer.tick(&mut self.registry, self.host.as_ref())
    }

    /// Resolve and run typed input. Returns `false` if no command matches.
    pub fn execute(&mut self, input: &str) -> bool {
        let Some(command) = self.registry.resolve(input) else {
            debug!("No command matches '{input}'");
            return false;
        };
        info!("Running {}", command.description());
        command.run(self.host.as_ref());
        true
    }

    pub fn suggestions(&mut self, input: &str) -> Vec<String> {
        self.registry.suggestions(input)
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    #[must_use]
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }
}

impl Drop for Launcher {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Unable to stop install listener: {e}");
        }
    }
}

fn load_installed(store: &ExtensionStore, registry: &mut CommandRegistry) -> Result<(), StoreError> {
    for (file_name, source) in store.sources()? {
        let factories = match extension::load(&source) {
            Ok(factories) => factories,
            Err(e) => {
                warn!("Skipping extension {file_name}: {e}");
                continue;
            }
        };
        let count = factories.len();
        match registry.register_all(factories) {
            Ok(()) => debug!("Loaded {count} commands from {file_name}"),
            Err(e) => warn!("Skipping extension {file_name}: {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RecordingHost;
    use std::time::Duration;

    const HELLO: &str = "\
commands:
  - type: no-arg
    name: hello
    desc: Says hello
    help: Prints a greeting
    run: echo hello
";

    fn config(dir: &std::path::Path) -> Config {
        Config {
            port: 0,
            extension_dir: dir.join("commands"),
            tick_interval: Duration::from_millis(10),
            fetch_timeout: Duration::from_secs(1),
            listen: true,
        }
    }

    fn launcher(dir: &std::path::Path, host: &RecordingHost) -> Launcher {
        let fetcher = |url: &str| -> Result<Vec<u8>, FetchError> {
            Err(FetchError::UnsupportedScheme(url.to_string()))
        };
        Launcher::with_fetcher(&config(dir), Box::new(host.clone()), Box::new(fetcher)).unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), &RecordingHost::new());
        assert!(launcher.registry().contains("web"));
        assert!(!launcher.is_listening());
    }

    #[test]
    fn test_loads_installed_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let commands = dir.path().join("commands");
        std::fs::create_dir_all(&commands).unwrap();
        std::fs::write(commands.join("hello.yaml"), HELLO).unwrap();
        std::fs::write(commands.join("broken.yaml"), "commands: [").unwrap();
        std::fs::write(commands.join("web.yaml"), HELLO.replace("hello", "web")).unwrap();

        let launcher = launcher(dir.path(), &RecordingHost::new());
        assert_eq!(
            launcher.registry().names().collect::<Vec<_>>(),
            vec!["web", "hello"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_execute() {
        let dir = tempfile::tempdir().unwrap();
        let commands = dir.path().join("commands");
        std::fs::create_dir_all(&commands).unwrap();
        std::fs::write(commands.join("hello.yaml"), HELLO).unwrap();
        let host = RecordingHost::new();
        let mut launcher = launcher(dir.path(), &host);

        assert!(launcher.execute("hello"));
        assert!(!launcher.execute("goodbye"));
        assert_eq!(host.messages(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_start_stop_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = launcher(dir.path(), &RecordingHost::new());

        let addr = launcher.start().unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(launcher.start().unwrap(), addr);
        assert_eq!(launcher.local_addr(), Some(addr));

        launcher.stop().unwrap();
        assert!(!launcher.is_listening());
        launcher.stop().unwrap();

        launcher.start().unwrap();
        assert!(launcher.is_listening());
    }

    #[test]
    fn test_restart_on_fixed_port() {
        let dir = tempfile::tempdir().unwrap();
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let fetcher = |url: &str| -> Result<Vec<u8>, FetchError> {
            Err(FetchError::UnsupportedScheme(url.to_string()))
        };
        let config = Config {
            port,
            ..config(dir.path())
        };
        let mut launcher =
            Launcher::with_fetcher(&config, Box::new(RecordingHost::new()), Box::new(fetcher))
                .unwrap();

        assert_eq!(launcher.start().unwrap().port(), port);
        launcher.stop().unwrap();
        assert_eq!(launcher.start().unwrap().port(), port);
        launcher.stop().unwrap();
    }
}
