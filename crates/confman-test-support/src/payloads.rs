//! Sample config payloads.

/// Process input section, with an explicit ticker when given.
#[must_use]
pub fn process_input(name: &str, ticker: Option<u32>) -> String {
    let mut text = format!("[{name}]\ntype = \"ProcessInput\"\n");
    if let Some(seconds) = ticker {
        text.push_str(&format!("ticker_interval = {seconds}\n"));
    }
    text.push_str("command = { cat = { bin = \"/bin/cat\", args = [\"/proc/loadavg\"] } }\n");
    text
}

/// HTTP input section.
#[must_use]
pub fn http_input(name: &str, url: &str) -> String {
    format!("[{name}]\ntype = \"HttpInput\"\nurl = \"{url}\"\n")
}

/// Log-stream input section.
#[must_use]
pub fn logstreamer_input(name: &str, log_directory: &str) -> String {
    format!(
        "[{name}]\ntype = \"LogstreamerInput\"\nlog_directory = \"{log_directory}\"\nfile_match = 'access\\.log'\n"
    )
}

/// File-polling input section.
#[must_use]
pub fn file_polling_input(name: &str, file_path: &str) -> String {
    format!("[{name}]\ntype = \"FilePollingInput\"\nfile_path = \"{file_path}\"\nticker_interval = 5\n")
}
