//! Program blocks for code-runner exercises.
//!
//! The browser runtime has no real stdin or filesystem, so the hidden
//! preamble installs `input`/`print`/`open` replacements. While a test case
//! runs, `input` reads from `_my_in` and `print` appends to `_my_out`;
//! `open` serves the question's data files from memory.

use std::fmt::Write;

use crate::question::CodeRunnerQuestion;

const IO_SHIM: &str = r#"import builtins as _builtins
import io as _io

_my_in = []
_my_out = ""
_capturing = False


def input(prompt=""):
    global _my_out
    if not _capturing:
        return _builtins.input(prompt)
    _my_out += str(prompt)
    return _my_in.pop() if _my_in else ""


def print(*args, sep=" ", end="\n", file=None, flush=False):
    global _my_out
    if file is not None or not _capturing:
        return _builtins.print(*args, sep=sep, end=end, file=file, flush=flush)
    _my_out += sep.join(str(arg) for arg in args) + end
"#;

const OPEN_SHIM: &str = r#"

def open(file, mode="r", *args, **kwargs):
    if file in _datafiles and "r" in mode and "b" not in mode:
        return _io.StringIO(_datafiles[file])
    return _builtins.open(file, mode, *args, **kwargs)
"#;

const RUN_CASE: &str = r#"def _run_case(_test_code, _stdin=""):
    global _my_in, _my_out, _capturing
    _my_in = list(reversed(_stdin.splitlines()))
    _my_out = ""
    _capturing = True
    try:
        exec(_test_code, globals())
    finally:
        _capturing = False
    return _my_out.strip()
"#;

const TESTS_HEADER: &str = r#"from unittest.gui import TestCaseGui


class myTests(TestCaseGui):
"#;

/// The four parts of an interactive program. Parts other than `code` are
/// absent for languages the browser runtime cannot execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramParts {
    pub language: String,
    pub preamble: Option<String>,
    pub code: String,
    pub postamble: Option<String>,
    pub tests: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct CodeWriter;

impl CodeWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn program_parts(&self, question: &CodeRunnerQuestion) -> ProgramParts {
        if !question.is_python() {
            return ProgramParts {
                language: program_language(&question.language),
                preamble: None,
                code: question.preload.clone(),
                postamble: None,
                tests: None,
            };
        }
        ProgramParts {
            language: program_language(&question.language),
            preamble: Some(self.preamble(question)),
            code: question.preload.clone(),
            postamble: Some(RUN_CASE.to_string()),
            tests: self.tests(question),
        }
    }

    pub fn preamble(&self, question: &CodeRunnerQuestion) -> String {
        let mut out = String::from(IO_SHIM);
        out.push_str("\n_datafiles = {\n");
        for (name, contents) in question.datafiles.iter().flatten() {
            let _ = writeln!(out, "    {}: {},", python_string(name), python_string(contents));
        }
        out.push_str("}\n");
        out.push_str(OPEN_SHIM);
        if let Some(preamble) = &question.preamble {
            out.push('\n');
            out.push_str(preamble);
            if !preamble.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }

    /// One assertion per test case; `None` when the question has no tests.
    pub fn tests(&self, question: &CodeRunnerQuestion) -> Option<String> {
        if question.test_cases.is_empty() {
            return None;
        }
        let mut out = String::from(TESTS_HEADER);
        for (index, case) in question.test_cases.iter().enumerate() {
            let description = if case.test_code.trim().is_empty() {
                format!("Testing with input {}", case.std_input.trim())
            } else {
                format!("Testing {}", case.test_code.trim())
            };
            let _ = write!(
                out,
                "\n    def testCase{}(self):\n        self.assertEqual(_run_case({}, {}), {}, {})\n",
                index + 1,
                python_string(&case.test_code),
                python_string(&case.std_input),
                python_string(case.expected.trim()),
                python_string(&description),
            );
        }
        out.push_str("\n\nmyTests().main()\n");
        Some(out)
    }
}

/// Runestone language name for a code-runner type such as `python3`.
pub fn program_language(language: &str) -> String {
    if language.starts_with("python") {
        return "python".to_string();
    }
    language
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == '_')
        .to_string()
}

/// A double-quoted Python string literal.
pub fn python_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
