use std::process::ExitCode;

use hark::launcher::Launcher;

/// Print every registered command with its description.
pub fn list(launcher: &Launcher) -> ExitCode {
    let registry = launcher.registry();
    let width = registry.iter().map(|f| f.expr().len()).max().unwrap_or(0);
    for factory in registry.iter() {
        println!("{:width$}  {}", factory.expr(), factory.description());
    }
    ExitCode::SUCCESS
}
