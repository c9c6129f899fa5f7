//! Ayu color theme and styling functions for keg CLI output.
//!
//! Uses the Ayu Dark palette (<https://github.com/ayu-theme/ayu-colors>).
//! Only outcomes get color: green for success, yellow for warnings, red for
//! failures. Stage headers use the accent blue.

use keg_core::history::Severity;
use owo_colors::OwoColorize;

use crate::terminal::supports_color;

// ---------------------------------------------------------------------------
// Ayu Dark color palette (RGB values)
// ---------------------------------------------------------------------------

const PASS: (u8, u8, u8) = (0xc2, 0xd9, 0x4c); // #c2d94c - bright green
const WARN: (u8, u8, u8) = (0xff, 0xb4, 0x54); // #ffb454 - bright yellow
const FAIL: (u8, u8, u8) = (0xf0, 0x71, 0x78); // #f07178 - bright red
const MUTED: (u8, u8, u8) = (0x6c, 0x76, 0x80); // #6c7680 - muted gray
const ACCENT: (u8, u8, u8) = (0x59, 0xc2, 0xff); // #59c2ff - bright blue

// ---------------------------------------------------------------------------
// Icons
// ---------------------------------------------------------------------------

pub const ICON_PASS: &str = "\u{2713}"; // check mark
pub const ICON_WARN: &str = "\u{26A0}"; // warning sign
pub const ICON_FAIL: &str = "\u{2716}"; // heavy x
pub const ICON_SKIP: &str = "-";
pub const ICON_INFO: &str = "\u{2139}"; // information source

/// Prefix of stage headers.
pub const HEADER_ARROW: &str = "==>";

// ---------------------------------------------------------------------------
// Helper: apply truecolor only when color is supported
// ---------------------------------------------------------------------------

fn color_str(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        s.to_string()
    }
}

fn color_bold_str(s: &str, rgb: (u8, u8, u8)) -> String {
    if supports_color() {
        s.truecolor(rgb.0, rgb.1, rgb.2).bold().to_string()
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Core semantic render helpers
// ---------------------------------------------------------------------------

pub fn render_warn(s: &str) -> String {
    color_str(s, WARN)
}

pub fn render_fail(s: &str) -> String {
    color_str(s, FAIL)
}

pub fn render_muted(s: &str) -> String {
    color_str(s, MUTED)
}

pub fn render_accent(s: &str) -> String {
    color_str(s, ACCENT)
}

pub fn render_bold(s: &str) -> String {
    if supports_color() {
        s.bold().to_string()
    } else {
        s.to_string()
    }
}

/// `==> text`, with the arrow in accent blue and the text in bold.
pub fn render_header(text: &str) -> String {
    format!("{} {}", color_bold_str(HEADER_ARROW, ACCENT), render_bold(text))
}

// ---------------------------------------------------------------------------
// Icon renderers
// ---------------------------------------------------------------------------

pub fn render_pass_icon() -> String {
    color_str(ICON_PASS, PASS)
}

pub fn render_warn_icon() -> String {
    color_str(ICON_WARN, WARN)
}

pub fn render_fail_icon() -> String {
    color_str(ICON_FAIL, FAIL)
}

pub fn render_skip_icon() -> String {
    color_str(ICON_SKIP, MUTED)
}

pub fn render_info_icon() -> String {
    color_str(ICON_INFO, ACCENT)
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// The colored icon for a finding severity.
pub fn render_severity_icon(severity: Severity) -> String {
    match severity {
        Severity::Info => render_info_icon(),
        Severity::Warning => render_warn_icon(),
        Severity::Error => render_fail_icon(),
    }
}

/// One line of a findings list: icon, then the message.
pub fn render_finding(severity: Severity, message: &str) -> String {
    let message = match severity {
        Severity::Info => message.to_string(),
        Severity::Warning => render_warn(message),
        Severity::Error => render_fail(message),
    };
    format!("{} {message}", render_severity_icon(severity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_text_keeps_content() {
        // NO_COLOR may or may not be set; only check the text survives.
        assert!(render_header("Installing mattext 0.8").contains("Installing mattext 0.8"));
        assert!(render_header("x").contains(HEADER_ARROW));
        let line = render_finding(Severity::Error, "0.6 and 0.7 share checksum");
        assert!(line.contains("share checksum"));
        assert!(line.contains(ICON_FAIL));
    }
}
