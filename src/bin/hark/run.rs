use std::process::ExitCode;

use clap::Args;

use hark::launcher::Launcher;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Text to resolve, e.g. `web rust ownership`
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
}

/// Resolve and run one input.
pub fn run(args: &RunArgs, launcher: &mut Launcher) -> ExitCode {
    let text = args.text.join(" ");
    if launcher.execute(&text) {
        ExitCode::SUCCESS
    } else {
        eprintln!("No command matches \u{201c}{text}\u{201d}");
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_words_are_collected() {
        let cli = Cli::try_parse_from(["hark", "web", "is", "rust", "fast?"]).unwrap();
        assert_eq!(cli.args.text.join(" "), "web is rust fast?");
    }

    #[test]
    fn test_text_is_required() {
        assert!(Cli::try_parse_from(["hark"]).is_err());
    }
}
