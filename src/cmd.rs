//! External command execution with captured output.
//!
//! Everything wgsteer does to OS networking state goes through the
//! [`CommandRunner`] trait, so the fatal/non-fatal distinction of the
//! appliers can be tested against a mock without touching a real firewall.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::Error;

#[cfg(test)]
use mockall::automock;

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Trait over process spawning so appliers can be exercised in tests.
///
/// `args` is `&[String]` rather than `&[&str]` because mockall cannot
/// express the nested lifetime of the latter.
#[cfg_attr(test, automock)]
pub trait CommandRunner: Send + Sync {
    /// Run a command, capturing stdout and stderr. Spawn failures (binary
    /// missing, not executable) are I/O errors; a non-zero exit is reported
    /// through [`CmdOutput::success`], not as an `Err`.
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CmdOutput>;

    /// Run a command feeding `input` to its stdin.
    fn run_with_stdin(
        &self,
        program: &str,
        args: &[String],
        input: &str,
    ) -> std::io::Result<CmdOutput>;
}

/// Production [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CmdOutput> {
        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }

    fn run_with_stdin(
        &self,
        program: &str,
        args: &[String],
        input: &str,
    ) -> std::io::Result<CmdOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Run a command and turn any failure, spawn or non-zero exit, into
/// [`Error::Apply`] carrying the program name and exit code.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<CmdOutput, Error> {
    let output = runner
        .run(program, &to_args(args))
        .map_err(|e| Error::apply(program, None, &e.to_string()))?;
    if output.success {
        Ok(output)
    } else {
        Err(Error::apply(program, output.code, &output.stderr))
    }
}

/// Like [`run_checked`] but with data piped to the command's stdin.
pub fn run_checked_with_stdin(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    input: &str,
) -> Result<CmdOutput, Error> {
    let output = runner
        .run_with_stdin(program, &to_args(args), input)
        .map_err(|e| Error::apply(program, None, &e.to_string()))?;
    if output.success {
        Ok(output)
    } else {
        Err(Error::apply(program, output.code, &output.stderr))
    }
}

/// Convert a borrowed argument slice into the owned form the trait needs.
pub fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_args() {
        assert_eq!(to_args(&["-A", "OUTPUT"]), vec!["-A", "OUTPUT"]);
        assert!(to_args(&[]).is_empty());
    }

    #[test]
    fn test_system_runner_captures_stdout() {
        let runner = SystemRunner::new();
        let out = runner.run("echo", &to_args(&["-n", "hello"])).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "hello");
    }

    #[test]
    fn test_system_runner_nonzero_exit() {
        let runner = SystemRunner::new();
        let out = runner.run("false", &to_args(&[])).unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(1));
    }

    #[test]
    fn test_system_runner_stdin_roundtrip() {
        let runner = SystemRunner::new();
        let out = runner
            .run_with_stdin("cat", &to_args(&[]), "add staging 10.0.0.0/8\n")
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "add staging 10.0.0.0/8\n");
    }

    #[test]
    fn test_run_checked_maps_failure_to_apply_error() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run().returning(|_, _| {
            Ok(CmdOutput {
                stdout: String::new(),
                stderr: "No such file or directory".to_string(),
                success: false,
                code: Some(2),
            })
        });

        let err = run_checked(&mock, "ipset", &["list", "wg_allowed_ips"]).unwrap_err();
        match err {
            Error::Apply { program, code, .. } => {
                assert_eq!(program, "ipset");
                assert_eq!(code, 2);
            }
            other => panic!("expected Apply error, got {other:?}"),
        }
    }

    #[test]
    fn test_run_checked_spawn_failure_is_apply_error() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .returning(|_, _| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")));

        let err = run_checked(&mock, "wg", &["show"]).unwrap_err();
        assert!(matches!(err, Error::Apply { code: -1, .. }));
    }
}
