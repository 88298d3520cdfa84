pub mod factory;
pub mod object;
pub mod registry;

pub use factory::{ArbitraryArgFactory, BoundedArgFactory, CommandFactory, NoArgFactory};
pub use object::{CommandError, CommandFn, CommandObject};
pub use registry::{CommandRegistry, RegistryError};
