//! Command line handling.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::config::CMDLINE_MAX;

/// Splits a command line on runs of ASCII whitespace.
///
/// The first word names the program. An empty result means the line held
/// nothing but whitespace.
pub fn tokenize(cmdline: &str) -> Vec<String> {
    cmdline.split_ascii_whitespace().map(ToString::to_string).collect()
}

/// Cuts `cmdline` to at most [`CMDLINE_MAX`] bytes on a character boundary.
pub fn bound_command_line(cmdline: &str) -> &str {
    if cmdline.len() <= CMDLINE_MAX {
        return cmdline;
    }
    let mut end = CMDLINE_MAX;
    while !cmdline.is_char_boundary(end) {
        end -= 1;
    }
    &cmdline[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_runs() {
        assert_eq!(tokenize("  echo   x\ty  "), ["echo", "x", "y"]);
    }

    #[test]
    fn blank_line_is_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t \n").is_empty());
    }

    #[test]
    fn short_line_untouched() {
        assert_eq!(bound_command_line("args-single onearg"), "args-single onearg");
    }

    #[test]
    fn long_line_bounded() {
        let long = "a".repeat(CMDLINE_MAX + 10);
        assert_eq!(bound_command_line(&long).len(), CMDLINE_MAX);
    }

    #[test]
    fn bound_respects_char_boundaries() {
        let mut long = "a".repeat(CMDLINE_MAX - 1);
        long.push('é');
        let bounded = bound_command_line(&long);
        assert_eq!(bounded.len(), CMDLINE_MAX - 1);
    }
}
