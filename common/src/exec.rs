/*
Copyright 2023 The Flame Authors.
Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at
    http://www.apache.org/licenses/LICENSE-2.0
Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::cell::RefCell;
use std::collections::HashMap;
use std::process::{Command, Output, Stdio};

use crate::JansError;

/// What the caller wants to happen when an external command exits non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Log a warning and carry on.
    #[default]
    Ignore,
    /// Turn the failure into a `JansError::Command`.
    Fatal,
}

/// Result of one external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: String,
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutcome {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Applies `policy` to this outcome.
    pub fn check(self, policy: ExitPolicy) -> Result<Self, JansError> {
        if self.succeeded {
            return Ok(self);
        }

        match policy {
            ExitPolicy::Ignore => {
                tracing::warn!(
                    "<{}> failed (exit code: {:?}), ignored: {}",
                    self.command,
                    self.exit_code,
                    self.stderr_lossy().trim()
                );
                Ok(self)
            }
            ExitPolicy::Fatal => Err(JansError::Command {
                command: self.command.clone(),
                code: self.exit_code,
                output: self.stderr_lossy().trim().to_string(),
            }),
        }
    }
}

/// Seam between the orchestrators and the processes they start.
///
/// A program that cannot be started at all is reported as a failed outcome
/// without exit code, so the caller's `ExitPolicy` decides in both cases.
pub trait CommandRunner {
    /// Runs the program with stdout and stderr captured.
    fn output(&self, program: &str, args: &[String]) -> Result<CommandOutcome, JansError>;

    /// Runs the program attached to the current terminal and waits for it.
    fn interactive(&self, program: &str, args: &[String]) -> Result<CommandOutcome, JansError>;
}

pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn outcome(command: String, result: std::io::Result<Output>) -> CommandOutcome {
        match result {
            Ok(output) => CommandOutcome {
                command,
                succeeded: output.status.success(),
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            },
            Err(e) => CommandOutcome {
                command,
                succeeded: false,
                exit_code: None,
                stdout: vec![],
                stderr: e.to_string().into_bytes(),
            },
        }
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self, program: &str, args: &[String]) -> Result<CommandOutcome, JansError> {
        let line = command_line(program, args);
        tracing::debug!("Running command: {line}");

        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output();

        Ok(Self::outcome(line, result))
    }

    fn interactive(&self, program: &str, args: &[String]) -> Result<CommandOutcome, JansError> {
        let line = command_line(program, args);
        tracing::debug!("Running interactive command: {line}");

        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map(|status| Output {
                status,
                stdout: vec![],
                stderr: vec![],
            });

        Ok(Self::outcome(line, result))
    }
}

/// Records command lines instead of running them. Programs succeed with
/// empty output unless configured otherwise.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    stdout: HashMap<String, Vec<u8>>,
    failing: Vec<String>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout(mut self, program: &str, stdout: &[u8]) -> Self {
        self.stdout.insert(program.to_string(), stdout.to_vec());
        self
    }

    pub fn failing(mut self, program: &str) -> Self {
        self.failing.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, program: &str, args: &[String]) -> CommandOutcome {
        let line = command_line(program, args);
        self.calls.borrow_mut().push(line.clone());

        let failed = self.failing.iter().any(|p| p == program);
        CommandOutcome {
            command: line,
            succeeded: !failed,
            exit_code: Some(if failed { 1 } else { 0 }),
            stdout: self.stdout.get(program).cloned().unwrap_or_default(),
            stderr: vec![],
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn output(&self, program: &str, args: &[String]) -> Result<CommandOutcome, JansError> {
        Ok(self.record(program, args))
    }

    fn interactive(&self, program: &str, args: &[String]) -> Result<CommandOutcome, JansError> {
        Ok(self.record(program, args))
    }
}
