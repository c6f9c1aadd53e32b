use std::io::IsTerminal;
use std::sync::OnceLock;

use crate::cli::{GlobalFlags, OutputFormat};

/// Terminal capabilities, detected once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UiPrefs {
    pub table_color: bool,
    /// Spinner on stderr; JSON on stdout is unaffected either way.
    pub progress: bool,
    /// Whether a confirmation prompt can be answered.
    pub interactive: bool,
    pub term_width: Option<usize>,
}

/// What the process is attached to.
#[derive(Clone, Copy, Debug)]
struct Terminal {
    stdin: bool,
    stdout: bool,
    stderr: bool,
    no_color: bool,
    columns: Option<usize>,
}

impl UiPrefs {
    fn detect(flags: &GlobalFlags, term: Terminal) -> Self {
        Self {
            table_color: term.stdout && flags.format == OutputFormat::Table && !flags.quiet && !term.no_color,
            progress: term.stderr && !flags.quiet && !flags.verbose,
            interactive: term.stdin && term.stderr,
            term_width: term.columns.filter(|width| *width >= 40),
        }
    }
}

static UI_PREFS: OnceLock<UiPrefs> = OnceLock::new();

pub fn init(flags: &GlobalFlags) {
    let term = Terminal {
        stdin: std::io::stdin().is_terminal(),
        stdout: std::io::stdout().is_terminal(),
        stderr: std::io::stderr().is_terminal(),
        no_color: std::env::var_os("NO_COLOR").is_some(),
        columns: std::env::var("COLUMNS").ok().and_then(|value| value.parse().ok()),
    };
    let _ = UI_PREFS.set(UiPrefs::detect(flags, term));
}

/// Current preferences; everything off until [`init`] runs.
#[must_use]
pub fn prefs() -> UiPrefs {
    UI_PREFS.get().copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn flags(format: OutputFormat, quiet: bool, verbose: bool) -> GlobalFlags {
        GlobalFlags {
            format,
            quiet,
            verbose,
            config: None,
            env_file: None,
        }
    }

    const TTY: Terminal = Terminal {
        stdin: true,
        stdout: true,
        stderr: true,
        no_color: false,
        columns: Some(120),
    };

    #[test]
    fn interactive_terminal_gets_everything() {
        let prefs = UiPrefs::detect(&flags(OutputFormat::Table, false, false), TTY);
        assert_eq!(
            prefs,
            UiPrefs {
                table_color: true,
                progress: true,
                interactive: true,
                term_width: Some(120),
            }
        );
    }

    #[test]
    fn piped_and_quiet_runs_stay_plain() {
        let piped = Terminal {
            stdin: false,
            stdout: false,
            stderr: false,
            no_color: true,
            columns: Some(20),
        };
        assert_eq!(UiPrefs::detect(&flags(OutputFormat::Table, false, false), piped), UiPrefs::default());
        let quiet = UiPrefs::detect(&flags(OutputFormat::Text, true, false), TTY);
        assert!(!quiet.progress);
        assert!(!quiet.table_color);
        assert!(quiet.interactive);
    }
}
