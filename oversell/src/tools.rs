//! External tool execution and host filesystem access
//!
//! Probes never spawn processes or touch `/proc`/`/sys` directly: they go
//! through a [`ToolRunner`] and a [`HostPaths`], so tests can substitute
//! scripted output and a fake filesystem tree.

use log::debug;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::domain::ProbeError;

/// Captured result of one tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Treat a non-zero exit as a tool execution failure
    pub fn check(self, tool: &str) -> Result<Self, ProbeError> {
        if self.success {
            return Ok(self);
        }
        let detail = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map_or_else(
                || format!("exited with status {}", self.code.unwrap_or(-1)),
                |l| l.trim().to_string(),
            );
        Err(ProbeError::ToolExecution { tool: tool.to_string(), detail })
    }
}

/// Runs an external measurement tool to completion
pub trait ToolRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<ToolOutput, ProbeError>> + Send;
}

/// Spawns real processes via tokio
///
/// Output is forced to the C locale so number and time formats are stable,
/// and children are killed if the probe future is dropped mid-run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ProbeError> {
        debug!("exec: {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    ProbeError::ToolMissing(program.to_string())
                } else {
                    ProbeError::ToolExecution { tool: program.to_string(), detail: e.to_string() }
                }
            })?;

        let out = ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            "exec: {program} exited {:?} ({} bytes stdout, {} bytes stderr)",
            out.code,
            out.stdout.len(),
            out.stderr.len()
        );
        Ok(out)
    }
}

/// Root under which `/proc`, `/sys` and `/dev/shm` are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    root: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::system()
    }
}

impl HostPaths {
    /// The live host
    pub fn system() -> Self {
        Self { root: PathBuf::from("/") }
    }

    /// A fake tree, e.g. a temp directory laid out like `/`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an absolute host path into this root
    pub fn path(&self, absolute: impl AsRef<Path>) -> PathBuf {
        let absolute = absolute.as_ref();
        self.root.join(absolute.strip_prefix("/").unwrap_or(absolute))
    }

    pub fn exists(&self, absolute: impl AsRef<Path>) -> bool {
        self.path(absolute).exists()
    }

    /// Read a small kernel file and trim the trailing newline
    pub fn read_trimmed(&self, absolute: impl AsRef<Path>) -> io::Result<String> {
        std::fs::read_to_string(self.path(absolute)).map(|s| s.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted runner for probe tests

    use super::{ToolOutput, ToolRunner};
    use crate::domain::ProbeError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replies with canned output per program and records every call
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        replies: HashMap<String, ToolOutput>,
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn stdout(mut self, program: &str, stdout: &str) -> Self {
            self.replies.insert(
                program.to_string(),
                ToolOutput {
                    success: true,
                    code: Some(0),
                    stdout: stdout.into(),
                    ..Default::default()
                },
            );
            self
        }

        pub fn stderr(mut self, program: &str, stderr: &str) -> Self {
            self.replies.insert(
                program.to_string(),
                ToolOutput {
                    success: true,
                    code: Some(0),
                    stderr: stderr.into(),
                    ..Default::default()
                },
            );
            self
        }

        pub fn failing(mut self, program: &str, code: i32, stderr: &str) -> Self {
            self.replies.insert(
                program.to_string(),
                ToolOutput {
                    success: false,
                    code: Some(code),
                    stderr: stderr.into(),
                    ..Default::default()
                },
            );
            self
        }

        pub fn reply(mut self, program: &str, output: ToolOutput) -> Self {
            self.replies.insert(program.to_string(), output);
            self
        }

        pub fn call_count(&self, program: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|(p, _)| p == program).count()
        }
    }

    impl ToolRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ProbeError> {
            self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));
            self.replies
                .get(program)
                .cloned()
                .ok_or_else(|| ProbeError::ToolMissing(program.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_path_mapping() {
        let host = HostPaths::with_root("/tmp/fake");
        assert_eq!(host.path("/proc/modules"), PathBuf::from("/tmp/fake/proc/modules"));
        assert_eq!(HostPaths::system().path("/sys/kernel"), PathBuf::from("/sys/kernel"));
    }

    #[test]
    fn test_check_reports_last_stderr_line() {
        let out = ToolOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: "starting\nfio: pid=0, err=22/file:filesetup.c\n\n".into(),
        };
        let err = out.check("fio").unwrap_err();
        assert!(err.to_string().contains("err=22"));
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_missing() {
        let result = SystemRunner.run("oversell-no-such-tool-xyz", &[]).await;
        assert!(matches!(result, Err(ProbeError::ToolMissing(_))));
    }
}
