//! Utilities for running external programs with captured output

use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Executable not found: {program}")]
    NotFound { program: String },

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed with exit code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Run a program to completion, failing on a nonzero exit status
///
/// Output is piped so nothing reaches the console. There is no timeout: the
/// call blocks until the child exits.
pub fn run_command(
    program: &Path,
    args: &[&str],
    working_dir: Option<&Path>,
) -> Result<Output, CommandError> {
    let program_name = program.display().to_string();

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    hide_console_window(&mut cmd);

    debug!("Running command: {} {}", program_name, args.join(" "));

    let output = cmd.output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CommandError::NotFound {
            program: program_name.clone(),
        },
        _ => CommandError::Spawn {
            program: program_name.clone(),
            source: e,
        },
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("Command failed: {} {}", program_name, args.join(" "));
        error!("Stderr: {}", stderr);
        return Err(CommandError::Failed {
            program: program_name,
            code: output.status.code(),
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout);
    }

    Ok(output)
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}
