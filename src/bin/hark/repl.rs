use std::io::{BufRead, Write};
use std::process::ExitCode;

use crossbeam_channel::{Receiver, select, tick, unbounded};
use log::{debug, error, info};

use hark::config_file::Config;
use hark::launcher::Launcher;

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Read stdin lines on a background thread. The channel closes at end of input.
fn stdin_lines() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("hark-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Unable to read input: {e}");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Empty,
    Quit,
    Suggest(&'a str),
    Execute(&'a str),
}

/// A leading `?` asks for suggestions. Anything else is passed on verbatim,
/// so arguments may end in `?` themselves.
fn parse_line(line: &str) -> Line<'_> {
    let input = line.trim_end_matches(['\r', '\n']);
    match input.trim() {
        "" => Line::Empty,
        ":q" | ":quit" => Line::Quit,
        _ => match input.strip_prefix('?') {
            Some(partial) => Line::Suggest(partial),
            None => Line::Execute(input),
        },
    }
}

/// Handle one line. Returns `false` when the user asked to quit.
fn handle_line(launcher: &mut Launcher, line: &str) -> bool {
    match parse_line(line) {
        Line::Empty => {}
        Line::Quit => return false,
        Line::Suggest(partial) => {
            let suggestions = launcher.suggestions(partial);
            if suggestions.is_empty() {
                println!("No suggestions");
            }
            for suggestion in suggestions {
                println!("  {suggestion}");
            }
        }
        Line::Execute(input) => {
            if !launcher.execute(input) {
                println!("No command matches \u{201c}{input}\u{201d}");
            }
        }
    }
    true
}

/// Run the interactive loop until end of input or `:quit`.
///
/// # Errors
///
/// Returns an error if the listener cannot be started or stdin cannot be read.
pub fn run(
    launcher: &mut Launcher,
    config: &Config,
    listen: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if listen {
        let addr = launcher.start()?;
        println!("Listening for install requests on http://{addr}/");
    }
    println!("Type a command, start a line with ? for suggestions, :quit to exit");

    let lines = stdin_lines()?;
    let ticker = tick(config.tick_interval);
    prompt();
    loop {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => {
                    if !handle_line(launcher, &line) {
                        break;
                    }
                    prompt();
                }
                Err(_) => {
                    debug!("End of input");
                    break;
                }
            },
            recv(ticker) -> _ => {
                if launcher.tick().is_some() {
                    prompt();
                }
            },
        }
    }

    launcher.stop()?;
    info!("Bye");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("\n"), Line::Empty);
        assert_eq!(parse_line(" :quit \n"), Line::Quit);
        assert_eq!(parse_line("?web\n"), Line::Suggest("web"));
        assert_eq!(parse_line("?\r\n"), Line::Suggest(""));
        assert_eq!(parse_line("hello\n"), Line::Execute("hello"));
    }

    #[test]
    fn test_trailing_question_mark_is_an_argument() {
        assert_eq!(
            parse_line("web is rust fast?\n"),
            Line::Execute("web is rust fast?")
        );
    }
}
