//! Running reference solutions to produce worked examples.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use thiserror::Error;

use crate::error::{ConvertError, Result};
use crate::options::ReferenceErrorPolicy;
use crate::question::CodeRunnerQuestion;

/// Output recorded for an example whose reference run failed.
pub const ERROR_PLACEHOLDER: &str = "error";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] io::Error),

    #[error("failed to run {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: io::Error,
    },

    #[error("exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("data file name {0:?} is not a plain file name")]
    InvalidDataFile(String),
}

impl RunError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RunError::TimedOut(_))
    }
}

/// Executes a program and returns its trimmed standard output.
pub trait CodeRunner {
    fn run(&self, code: &str, stdin: &str, files: &BTreeMap<String, String>)
        -> Result<String, RunError>;
}

/// Runs code with a Python interpreter in a scratch directory per call.
#[derive(Debug, Clone)]
pub struct PythonCodeRunner {
    interpreter: String,
    timeout: Duration,
}

impl Default for PythonCodeRunner {
    fn default() -> Self {
        Self::new("python3", Duration::from_secs(10))
    }
}

impl PythonCodeRunner {
    pub fn new(interpreter: &str, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            timeout,
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn spawn_error(&self, source: io::Error) -> RunError {
        RunError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        }
    }
}

/// A single normal path component: no separators, no `..`, not absolute.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl CodeRunner for PythonCodeRunner {
    fn run(
        &self,
        code: &str,
        stdin: &str,
        files: &BTreeMap<String, String>,
    ) -> Result<String, RunError> {
        if let Some(name) = files.keys().find(|name| !is_plain_file_name(name)) {
            return Err(RunError::InvalidDataFile(name.clone()));
        }
        let scratch = TempDir::new().map_err(RunError::Scratch)?;
        for (name, contents) in files {
            fs::write(scratch.path().join(name), contents).map_err(RunError::Scratch)?;
        }

        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(code)
            .current_dir(scratch.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.spawn_error(source))?;

        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_string();
            // A program that never reads its input closes the pipe early.
            thread::spawn(move || {
                let _ = pipe.write_all(input.as_bytes());
            })
        });
        let stdout = child.stdout.take().map(|pipe| thread::spawn(move || drain(pipe)));
        let stderr = child.stderr.take().map(|pipe| thread::spawn(move || drain(pipe)));

        let status = wait_with_deadline(&mut child, self.timeout)
            .map_err(|source| self.spawn_error(source))?;

        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = stdout
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match status {
            None => Err(RunError::TimedOut(self.timeout)),
            Some(status) if !status.success() => Err(RunError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }),
            Some(_) => Ok(stdout.trim().to_string()),
        }
    }
}

fn drain(mut pipe: impl Read) -> String {
    let mut bytes = Vec::new();
    let _ = pipe.read_to_end(&mut bytes);
    String::from_utf8_lossy(&bytes).into_owned()
}

/// `None` means the deadline passed and the child was killed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleRun {
    pub test_code: String,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Default)]
pub struct ExampleResults {
    pub runs: Vec<ExampleRun>,
    /// Failures that were replaced by [`ERROR_PLACEHOLDER`].
    pub failures: Vec<RunError>,
}

/// Run the reference solution once per example case.
///
/// Each run executes the template preamble, the reference answer and the
/// case's test code, feeding the case's standard input. Timeouts always
/// abort; other failures follow `policy`.
pub fn run_example_cases(
    runner: &dyn CodeRunner,
    question: &CodeRunnerQuestion,
    question_id: &str,
    policy: ReferenceErrorPolicy,
) -> Result<ExampleResults> {
    let reference = question.reference_code();
    let no_files = BTreeMap::new();
    let files = question.datafiles.as_ref().unwrap_or(&no_files);

    let mut results = ExampleResults::default();
    for case in question.example_cases() {
        let code = [reference.as_str(), case.test_code.as_str()].join("\n");
        let output = match runner.run(&code, &case.std_input, files) {
            Ok(output) => output,
            Err(err) if err.is_timeout() || policy == ReferenceErrorPolicy::Fail => {
                return Err(ConvertError::ReferenceSolution {
                    question: question_id.to_string(),
                    source: err,
                })
            }
            Err(err) => {
                log::warn!(
                    "reference solution of question {} failed, using placeholder: {}",
                    question_id,
                    err
                );
                results.failures.push(err);
                ERROR_PLACEHOLDER.to_string()
            }
        };
        results.runs.push(ExampleRun {
            test_code: case.test_code.clone(),
            input: case.std_input.clone(),
            output,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::TestCase;
    use std::cell::RefCell;

    /// Replays canned results and records what it was asked to run.
    struct ScriptedRunner {
        results: RefCell<Vec<Result<String, RunError>>>,
        seen: RefCell<Vec<(String, String, usize)>>,
    }

    impl ScriptedRunner {
        fn new(results: Vec<Result<String, RunError>>) -> Self {
            Self {
                results: RefCell::new(results.into_iter().rev().collect()),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CodeRunner for ScriptedRunner {
        fn run(
            &self,
            code: &str,
            stdin: &str,
            files: &BTreeMap<String, String>,
        ) -> Result<String, RunError> {
            self.seen
                .borrow_mut()
                .push((code.to_string(), stdin.to_string(), files.len()));
            self.results
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn example(test_code: &str, stdin: &str) -> TestCase {
        TestCase {
            use_as_example: true,
            ..TestCase::new(test_code, "", stdin)
        }
    }

    fn question(cases: Vec<TestCase>) -> CodeRunnerQuestion {
        CodeRunnerQuestion {
            language: "python3".to_string(),
            preload: String::new(),
            answer: "def add(x):\n    return x + 2".to_string(),
            preamble: Some("import math".to_string()),
            test_cases: cases,
            datafiles: Some(BTreeMap::from([("pets.txt".to_string(), "cat".to_string())])),
        }
    }

    fn failure() -> RunError {
        RunError::Failed {
            status: "exit status: 1".to_string(),
            stderr: "Traceback".to_string(),
        }
    }

    #[test]
    fn only_example_cases_run_with_reference_code() {
        let runner = ScriptedRunner::new(vec![Ok("4".to_string())]);
        let mut cases = vec![example("print(add(2))", "")];
        cases.push(TestCase::new("print(add(3))", "5", ""));
        let results =
            run_example_cases(&runner, &question(cases), "7", ReferenceErrorPolicy::Fail).unwrap();

        assert_eq!(
            results.runs,
            vec![ExampleRun {
                test_code: "print(add(2))".to_string(),
                input: String::new(),
                output: "4".to_string(),
            }]
        );
        let seen = runner.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "import math\ndef add(x):\n    return x + 2\nprint(add(2))");
        assert_eq!(seen[0].2, 1);
    }

    #[test]
    fn placeholder_policy_keeps_going() {
        let runner = ScriptedRunner::new(vec![Err(failure()), Ok("ok".to_string())]);
        let cases = vec![example("boom()", ""), example("print('ok')", "x")];
        let results =
            run_example_cases(&runner, &question(cases), "7", ReferenceErrorPolicy::Placeholder)
                .unwrap();
        let outputs: Vec<&str> = results.runs.iter().map(|r| r.output.as_str()).collect();
        assert_eq!(outputs, vec![ERROR_PLACEHOLDER, "ok"]);
        assert_eq!(results.failures.len(), 1);
        assert_eq!(runner.seen.borrow()[1].1, "x");
    }

    #[test]
    fn fail_policy_aborts() {
        let runner = ScriptedRunner::new(vec![Err(failure())]);
        let err = run_example_cases(
            &runner,
            &question(vec![example("boom()", "")]),
            "7",
            ReferenceErrorPolicy::Fail,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::ReferenceSolution { ref question, .. } if question == "7"));
    }

    #[test]
    fn timeouts_abort_even_with_placeholders() {
        let runner = ScriptedRunner::new(vec![Err(RunError::TimedOut(Duration::from_secs(1)))]);
        let err = run_example_cases(
            &runner,
            &question(vec![example("while True: pass", "")]),
            "7",
            ReferenceErrorPolicy::Placeholder,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::ReferenceSolution { source: RunError::TimedOut(_), .. }
        ));
    }
}
