//! Terminal palette for check output.
//!
//! Catppuccin-inspired names mapped onto standard ANSI colors so output stays
//! readable on any terminal.

use colored::{ColoredString, Colorize};

/// Extension trait for applying the palette to strings.
pub trait CatppuccinExt {
    /// Failures
    fn ctp_red(&self) -> ColoredString;
    /// Transport failures
    fn maroon(&self) -> ColoredString;
    /// Warnings (expiring soon)
    fn peach(&self) -> ColoredString;
    /// Progress ("Checking website")
    fn ctp_yellow(&self) -> ColoredString;
    /// Success
    fn ctp_green(&self) -> ColoredString;
    /// Banner and separators
    fn teal(&self) -> ColoredString;
    /// Secondary detail (validity window)
    fn overlay1(&self) -> ColoredString;
}

impl<S: AsRef<str>> CatppuccinExt for S {
    fn ctp_red(&self) -> ColoredString {
        self.as_ref().bright_red()
    }

    fn maroon(&self) -> ColoredString {
        self.as_ref().red()
    }

    // Peach -> bright yellow (orange-ish)
    fn peach(&self) -> ColoredString {
        self.as_ref().bright_yellow()
    }

    fn ctp_yellow(&self) -> ColoredString {
        self.as_ref().yellow()
    }

    fn ctp_green(&self) -> ColoredString {
        self.as_ref().bright_green()
    }

    fn teal(&self) -> ColoredString {
        self.as_ref().cyan()
    }

    // Overlay1 -> bright black (gray)
    fn overlay1(&self) -> ColoredString {
        self.as_ref().bright_black()
    }
}
