//! External commands as workload and cleanup steps.

use std::fmt;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;

use evcheck_types::{tail_lines, truncate_with_ellipsis};

/// Lines of stderr kept in a failure detail.
const STDERR_TAIL_LINES: usize = 8;

/// Upper bound on a rendered command line in logs and errors.
const MAX_DISPLAY_CHARS: usize = 160;

/// A program and its arguments. Never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(argv: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let mut argv = argv.into_iter().map(Into::into);
        let program = match argv.next() {
            Some(program) if !program.trim().is_empty() => program,
            _ => bail!("command must name a program"),
        };
        Ok(Self {
            program,
            args: argv.collect(),
        })
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion. A non-zero exit is an error carrying the exit
    /// status and the tail of stderr.
    pub async fn run(&self) -> Result<()> {
        let rendered = truncate_with_ellipsis(&self.to_string(), MAX_DISPLAY_CHARS);
        tracing::info!(command = %rendered, "Running command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn `{rendered}`"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(command = %rendered, stdout = %tail_lines(&stdout, STDERR_TAIL_LINES));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = tail_lines(&stderr, STDERR_TAIL_LINES);
            if tail.is_empty() {
                bail!("`{rendered}` exited with {}", output.status);
            }
            bail!("`{rendered}` exited with {}:\n{tail}", output.status);
        }
        Ok(())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}
