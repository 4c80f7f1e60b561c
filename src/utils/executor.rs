//! Command execution abstraction for testability
//!
//! The archiver backend spawns its tool through this trait so tests can
//! record invocations and script exit statuses without a real binary.

use super::command::CommandError;
use std::path::Path;
use std::process::Output;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a program to completion in an optional working directory
    fn run_command(
        &self,
        program: &Path,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<Output, CommandError>;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run_command(
        &self,
        program: &Path,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<Output, CommandError> {
        super::command::run_command(program, args, working_dir)
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: PathBuf,
        pub args: Vec<String>,
        pub working_dir: Option<PathBuf>,
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        NotFound,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    /// Mock executor for testing
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses keyed by the last argument (the archive path
        /// for archiver calls) or by program name
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for invocations whose program or any argument matches `key`
        pub fn expect(self, key: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(key.to_string(), response);
            self
        }

        /// Set the default response for unconfigured invocations
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of recorded invocations
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn record_call(&self, program: &Path, args: &[&str], working_dir: Option<&Path>) {
            self.calls.lock().unwrap().push(CommandCall {
                program: program.to_path_buf(),
                args: args.iter().map(|s| s.to_string()).collect(),
                working_dir: working_dir.map(Path::to_path_buf),
            });
        }

        fn get_response(&self, program: &Path, args: &[&str]) -> MockResponse {
            let responses = self.responses.lock().unwrap();
            let program_key = program.display().to_string();
            std::iter::once(program_key.as_str())
                .chain(args.iter().copied())
                .find_map(|key| responses.get(key).cloned())
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run_command(
            &self,
            program: &Path,
            args: &[&str],
            working_dir: Option<&Path>,
        ) -> Result<Output, CommandError> {
            self.record_call(program, args, working_dir);

            match self.get_response(program, args) {
                MockResponse::Success { stdout, stderr } => Ok(Output {
                    status: std::process::ExitStatus::default(),
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                }),
                MockResponse::Failure { stderr, exit_code } => Err(CommandError::Failed {
                    program: program.display().to_string(),
                    code: Some(exit_code),
                    stderr,
                }),
                MockResponse::NotFound => Err(CommandError::NotFound {
                    program: program.display().to_string(),
                }),
            }
        }
    }
}
