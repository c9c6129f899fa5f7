//! Terminal detection utilities.

use std::env;

/// Returns `true` if stdout is connected to a terminal (TTY).
pub fn is_tty() -> bool {
    crossterm::tty::IsTty::is_tty(&std::io::stdout())
}

/// Determines if ANSI color codes should be used.
///
/// Respects standard conventions:
/// - `NO_COLOR` (any value): disables color (<https://no-color.org/>)
/// - `CLICOLOR=0`: disables color
/// - `TERM=dumb`: disables color
/// - `CLICOLOR_FORCE` (any value): forces color even in non-TTY
/// - Falls back to TTY detection
pub fn supports_color() -> bool {
    color_from_env(
        env::var_os("NO_COLOR").is_some(),
        env::var("CLICOLOR").ok().as_deref(),
        env::var("TERM").ok().as_deref(),
        env::var_os("CLICOLOR_FORCE").is_some(),
    )
    .unwrap_or_else(is_tty)
}

/// The color decision the environment forces, if any.
fn color_from_env(
    no_color: bool,
    clicolor: Option<&str>,
    term: Option<&str>,
    force: bool,
) -> Option<bool> {
    if no_color || clicolor == Some("0") || term == Some("dumb") {
        return Some(false);
    }
    force.then_some(true)
}
