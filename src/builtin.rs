//! Commands that ship with the launcher

use log::debug;
use url::form_urlencoded;

use crate::adapter::{AdapterError, CommandDescriptor, build_factory};
use crate::commands::factory::CommandFactory;
use crate::commands::object::CommandError;
use crate::messages::Host;

const SEARCH_URL: &str = "https://www.google.com/search";

/// Search engines reject longer request URLs.
const MAX_QUERY_LENGTH: usize = 2048;

/// Two-letter language code from a POSIX locale string such as `de_DE.UTF-8`.
fn language(locale: Option<&str>) -> &str {
    locale
        .and_then(|l| l.split(['_', '.', '@']).next())
        .filter(|code| !code.is_empty() && *code != "C" && *code != "POSIX")
        .unwrap_or("en")
}

fn search_url(language: &str, text: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("hl", language)
        .append_pair("q", text)
        .finish();
    format!("{SEARCH_URL}?{query}")
}

fn web_search(host: &dyn Host, arg: Option<&str>) -> Result<(), CommandError> {
    let text = match arg {
        Some(arg) => arg.to_string(),
        None => host.selected_text().unwrap_or_default(),
    };
    let text = text.trim();
    if text.is_empty() {
        host.display_message("No text was selected.");
        return Ok(());
    }

    let locale = std::env::var("LANG").ok();
    let url = search_url(language(locale.as_deref()), text);
    if url.len() > MAX_QUERY_LENGTH {
        host.display_message("Your query is too long.");
        return Ok(());
    }
    debug!("Searching the web for '{text}'");
    host.open_url(&url)
}

/// Descriptor of the `web {search terms}` command.
#[must_use]
pub fn web() -> CommandDescriptor {
    CommandDescriptor::arbitrary_arg(
        "web",
        "search terms",
        "Performs a web search on the selected or typed text.",
        "Opens a search for the given words, or for the current selection when none are typed.",
        web_search,
    )
}

/// Factories for every built-in command.
///
/// # Errors
///
/// Returns `AdapterError` if a built-in descriptor is malformed.
pub fn factories() -> Result<Vec<Box<dyn CommandFactory>>, AdapterError> {
    [web()].iter().map(build_factory).collect()
}
