use std::process::ExitCode;

use clap::Args;
use log::debug;

use hark::config_file::Config;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// URL of the extension to install
    url: String,

    /// Listener port (defaults to the configured port)
    #[arg(short, long)]
    port: Option<u16>,
}

/// Post an install request to a running listener.
///
/// # Errors
///
/// Returns an error if the listener cannot be reached.
pub fn run(args: &SendArgs, config: &Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let port = args.port.unwrap_or(config.port);
    let endpoint = format!("http://127.0.0.1:{port}/");
    debug!("Sending {} to {endpoint}", args.url);
    let response = reqwest::blocking::Client::new()
        .post(&endpoint)
        .form(&[("url", args.url.as_str())])
        .send()?;
    let status = response.status();
    let body = response.text()?;
    if status.is_success() {
        println!("Queued {} for install", args.url);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Listener refused the request: {} {body}", status.as_u16());
        Ok(ExitCode::FAILURE)
    }
}
