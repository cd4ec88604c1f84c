//! Formatted log blocks on top of the `log` facade.
//!
//! Headers and summaries span several records so they stay readable in both
//! plain terminal output and JSON log streams.

/// Log a header
pub fn header(title: &str) {
    let border = "=".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

/// Render summary items on one line, for error-level reporting.
pub fn inline(items: &[(&str, String)]) -> String {
    items
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}
