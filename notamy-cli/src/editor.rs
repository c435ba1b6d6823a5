//! Note body capture from standard input or an external editor.

use std::io::{self, Read, Write};
use std::process::Command;

/// Returns the body text the user entered.
///
/// Standard input is read to EOF when `from_stdin` is set; otherwise `editor`
/// is spawned on a temporary file seeded with `initial`, and the file is read
/// back once the editor exits.
///
/// # Errors
///
/// Returns an I/O error if stdin or the temporary file cannot be read, if the
/// editor cannot be started, or if it exits with a non-zero status.
pub fn capture_body(editor: &str, from_stdin: bool, initial: &str) -> io::Result<String> {
    if from_stdin {
        return read_stdin();
    }

    let mut file = tempfile::Builder::new()
        .prefix("notamy-body-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    tracing::debug!("spawning {editor} on {}", file.path().display());
    let status = Command::new(editor).arg(file.path()).status()?;
    if !status.success() {
        return Err(io::Error::other(format!(
            "editor '{editor}' exited with {status}"
        )));
    }

    let body = std::fs::read_to_string(file.path())?;
    Ok(trim_final_newline(body))
}

fn read_stdin() -> io::Result<String> {
    let mut body = String::new();
    io::stdin().read_to_string(&mut body)?;
    Ok(trim_final_newline(body))
}

/// Editors and heredocs append one newline the user never typed.
fn trim_final_newline(mut body: String) -> String {
    if body.ends_with('\n') {
        body.pop();
        if body.ends_with('\r') {
            body.pop();
        }
    }
    body
}
