//! External process invocation shared by the classifier bridge and the `readelf` fallback. One
//! retry absorbs transient spawn failures; a non-zero exit is reported against the path under
//! analysis.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

use tracing::debug;

use crate::{Error, Result};

/// Runs the program with the given arguments and returns its stdout. The spawn is retried once
/// on an I/O failure; a non-zero exit status becomes [Error::ExternalToolFailure] naming the
/// subject path.
pub(crate) fn run_capturing(
    program: &OsStr,
    args: &[&OsStr],
    subject: &Path,
) -> Result<Vec<u8>> {
    let output = match spawn(program, args) {
        Ok(output) => output,
        Err(error) => {
            debug!(?program, %error, "tool spawn failed, retrying once");
            spawn(program, args)?
        }
    };

    if !output.status.success() {
        debug!(?program, status = ?output.status, "tool exited non-zero");
        return Err(Error::ExternalToolFailure(subject.to_path_buf()));
    }
    Ok(output.stdout)
}

fn spawn(program: &OsStr, args: &[&OsStr]) -> std::io::Result<Output> {
    Command::new(program).args(args).output()
}
