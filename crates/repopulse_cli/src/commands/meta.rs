use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::Cli;

/// Render the completion script for `shell`.
pub(crate) fn completion_script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut out = Vec::new();
    generate(shell, &mut cmd, "repopulse", &mut out);
    out
}

/// Write the completion script for `shell` to stdout.
pub(crate) fn handle_completions(shell: Shell) -> std::io::Result<()> {
    use std::io::Write;

    let script = completion_script(shell);
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&script)?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_script_contains_binary_name() {
        let script = completion_script(Shell::Bash);
        let script = String::from_utf8(script).expect("completion output should be UTF-8");
        assert!(script.contains("repopulse"));
        assert!(script.contains("watch"));
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
