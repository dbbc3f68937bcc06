use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};

use crate::session::CliSession;
use crate::Commands;

#[derive(Parser)]
#[command(name = "maestro", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Commands,
}

/// Splits on whitespace, keeping single- or double-quoted runs together.
pub(crate) fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    for ch in line.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if let Some(open) = quote {
        return Err(format!("unterminated {open} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Runs one command per input line. Errors are reported and the shell keeps
/// going; the workspace is saved after every line that changed it.
pub(crate) fn run(session: &mut CliSession, input: impl BufRead, out: &mut dyn Write) -> Result<()> {
    for line in input.lines() {
        let line = line.context("Failed to read command")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        let words = match split_line(line) {
            Ok(words) => words,
            Err(err) => {
                writeln!(out, "error: {err}")?;
                continue;
            }
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                write!(out, "{}", err.render())?;
                continue;
            }
        };
        if let Err(err) = session.execute(parsed.command, out) {
            writeln!(out, "error: {err:#}")?;
        }
        session.save_if_changed()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use maestro_core::ManualClock;
    use maestro_runtime::MaestroConfig;
    use maestro_storage::MemorySnapshotStore;
    use std::sync::Arc;

    fn ts(offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + offset_ms)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn quotes_group_words() {
        assert_eq!(
            split_line(r#"segment start Work "Write code" --type terminal"#).expect("split"),
            vec!["segment", "start", "Work", "Write code", "--type", "terminal"]
        );
        assert_eq!(split_line("tab  open 'a b'c").expect("split"), vec!["tab", "open", "a bc"]);
        assert_eq!(split_line(r#"x """#).expect("split"), vec!["x", ""]);
        assert!(split_line("space add \"open").is_err());
    }

    #[test]
    fn undo_spans_lines_of_one_shell() {
        let clock = Arc::new(ManualClock::new(ts(0)));
        let mut session = CliSession::with_snapshots(
            &MaestroConfig::default(),
            Box::new(MemorySnapshotStore::new()),
            clock,
        )
        .expect("session");
        let script = "\
# comments and blank lines are skipped

space add Work
space list
undo
space list
bogus
space rm Nowhere
quit
space add Never
";
        let mut out = Vec::new();
        run(&mut session, script.as_bytes(), &mut out).expect("shell");
        let text = String::from_utf8(out).expect("utf-8");

        assert_eq!(text.matches("\tWork\t").count(), 1);
        assert!(text.contains("undone"));
        assert!(text.contains("error: no space matches \"Nowhere\""));
        assert!(text.contains("unrecognized subcommand"));
        assert!(session.store().spaces().is_empty());
    }
}
