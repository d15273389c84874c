//! Synchronous execution of external tools.

use std::{
    fs::File,
    io,
    path::Path,
    process::{Command, ExitStatus, Stdio},
    time::Instant,
};
use crate::{
    Error,
    err::add_path,
    ext,
};

/// At most this many lines of stderr are repeated in the log and in error messages.
const STDERR_LINES: usize = 10;

/// Result of a finished external process.
#[derive(Debug)]
pub struct Invocation {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
}

/// Runs the command and waits until it finishes.
/// If `stdout_target` is set, standard output is written to that file, otherwise it is discarded.
///
/// Non-zero exit code is not an error (it is only reported), as tools may use it for warnings.
/// Termination without an exit code (for example, by a signal) produces `ToolExecution` error.
pub fn invoke(command: &mut Command, stdout_target: Option<&Path>) -> Result<Invocation, Error> {
    let cmd_str = ext::fmt::command(command);
    match stdout_target {
        Some(path) => {
            log::debug!("    {} > {}", cmd_str, ext::fmt::path(path));
            let file = File::create(path).map_err(add_path!(path))?;
            command.stdout(Stdio::from(file));
        }
        None => {
            log::debug!("    {}", cmd_str);
            command.stdout(Stdio::null());
        }
    }
    command.stdin(Stdio::null()).stderr(Stdio::piped());

    let start = Instant::now();
    let output = command.output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::ToolNotFound(command.get_program().into()),
        _ => Error::Io(e, vec![command.get_program().into()]),
    })?;
    log::debug!("    Finished in {}", ext::fmt::Duration(start.elapsed()));

    let invocation = Invocation { status: output.status, stderr: output.stderr };
    match invocation.status.code() {
        Some(0) => {}
        Some(code) => log::warn!("    `{}` finished with exit code {}:\n{}",
            cmd_str, code, ext::sys::tail_lines(&invocation.stderr, STDERR_LINES)),
        None => return Err(Error::ToolExecution(format!("`{}` terminated abnormally ({}):\n{}",
            cmd_str, invocation.status, ext::sys::tail_lines(&invocation.stderr, STDERR_LINES)))),
    }
    Ok(invocation)
}
