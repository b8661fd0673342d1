//! Error types for wgsteer.

use thiserror::Error;

/// Errors surfaced by the rule-regeneration pipeline.
///
/// Every variant maps to one failure class: a malformed entry in a
/// user-editable list, an unusable range data source, or a failed OS-tool
/// invocation. All of them abort the run; nothing is ever partially applied.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed entry in a user-editable prefix list. Fatal: a ruleset
    /// derived from a half-understood override list is never applied.
    #[error("{file}:{line}: invalid prefix entry '{entry}'")]
    Parse {
        file: String,
        line: usize,
        entry: String,
    },

    /// The range data source is unavailable or its payload is unusable.
    /// There is no safe fallback set, so this is always fatal.
    #[error("range source failure: {0}")]
    Resolve(String),

    /// An invoked OS command exited non-zero. Exit code -1 means the
    /// process was terminated by a signal.
    #[error("command `{program}` failed with exit code {code}: {stderr}")]
    Apply {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::Apply`] from a finished command's output.
    pub fn apply(program: &str, code: Option<i32>, stderr: &str) -> Self {
        Error::Apply {
            program: program.to_string(),
            code: code.unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        }
    }
}
