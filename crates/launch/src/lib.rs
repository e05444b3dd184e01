//! Child process launching.
//!
//! Deliberately does not sandbox the child in any way (no namespaces, no
//! chroot): isolating build commands is out of scope here, unlike a general
//! package-building tool that must run untrusted recipes. What this crate
//! does take care of is piping stdout/stderr through dedicated reader
//! threads, since a child that fills both pipe buffers while we read them
//! sequentially can deadlock.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn '{0}': {1}")]
    Spawn(String, std::io::Error),
    #[error("failed to wait on '{0}': {1}")]
    Wait(String, std::io::Error),
}

pub struct Output {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Output {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs `cmd` to completion, capturing both stdout and stderr in full.
pub fn run_captured(cmd: &mut Command) -> Result<Output, Error> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Spawn(program.clone(), e))?;

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let stdout_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf);
        buf
    });

    let status = child.wait().map_err(|e| Error::Wait(program.clone(), e))?;

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(Output { status, stdout, stderr })
}

/// Runs `cmd`, forwarding each stdout/stderr line to `on_line` as it
/// arrives rather than buffering the whole run, for build steps that want
/// to show compiler output live.
pub fn run_streamed(cmd: &mut Command, mut on_line: impl FnMut(Line, &str)) -> Result<ExitStatus, Error> {
    use std::io::{BufRead, BufReader};
    use std::sync::mpsc;

    let program = cmd.get_program().to_string_lossy().into_owned();

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Spawn(program.clone(), e))?;

    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");

    let (tx, rx) = mpsc::channel();

    let tx_out = tx.clone();
    let stdout_reader = thread::spawn(move || {
        for line in BufReader::new(stdout_pipe).lines().map_while(Result::ok) {
            let _ = tx_out.send((Line::Stdout, line));
        }
    });
    let stderr_reader = thread::spawn(move || {
        for line in BufReader::new(stderr_pipe).lines().map_while(Result::ok) {
            let _ = tx.send((Line::Stderr, line));
        }
    });

    // `rx` closes once both reader threads drop their sender halves, which
    // happens as soon as each pipe hits EOF.
    for (stream, line) in rx {
        on_line(stream, &line);
    }

    let _ = stdout_reader.join();
    let _ = stderr_reader.join();

    child.wait().map_err(|e| Error::Wait(program, e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Stdout,
    Stderr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello; echo world 1>&2; exit 3");

        let out = run_captured(&mut cmd).unwrap();
        assert_eq!(out.stdout_string().trim(), "hello");
        assert_eq!(out.stderr_string().trim(), "world");
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.success());
    }

    #[test]
    fn streams_lines_in_order_per_stream() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo a; echo b; echo c");

        let mut lines = Vec::new();
        let status = run_streamed(&mut cmd, |stream, line| lines.push((stream, line.to_string()))).unwrap();

        assert!(status.success());
        let stdout_lines: Vec<_> = lines.iter().filter(|(s, _)| *s == Line::Stdout).map(|(_, l)| l.clone()).collect();
        assert_eq!(stdout_lines, vec!["a", "b", "c"]);
    }
}
