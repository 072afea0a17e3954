//! Shared fakes for orchestrator tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::environment::DatabaseTool;
use crate::error::{VaultError, VaultResult};
use crate::restore::Operator;

/// An exit status of 1 for simulated primitive failures
pub fn failed_status() -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(1 << 8)
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(1)
    }
}

fn primitive_failure(command: &str) -> VaultError {
    VaultError::PrimitiveFailed {
        command: command.to_string(),
        status: failed_status(),
        stderr: "simulated failure".to_string(),
    }
}

/// In-process stand-in for `pg_dump`/`psql`
pub struct FakeTool {
    /// Bytes the fake dump emits
    pub dump_output: Vec<u8>,
    /// Fail every dump after emitting `dump_output`
    pub fail_dump: bool,
    /// Fail every restore after consuming the input
    pub fail_restore: bool,
    /// Truncate in-flight `.partial` files under this directory mid-dump
    pub corrupt_partials_in: Option<PathBuf>,
    pub dump_calls: Cell<usize>,
    /// Every byte stream the fake restore received
    pub restored: RefCell<Vec<Vec<u8>>>,
}

impl Default for FakeTool {
    fn default() -> Self {
        Self {
            dump_output: b"CREATE TABLE items (id int);\nINSERT INTO items VALUES (1);\n".to_vec(),
            fail_dump: false,
            fail_restore: false,
            corrupt_partials_in: None,
            dump_calls: Cell::new(0),
            restored: RefCell::new(Vec::new()),
        }
    }
}

impl FakeTool {
    pub fn failing_dump() -> Self {
        Self {
            fail_dump: true,
            ..Self::default()
        }
    }

    pub fn failing_restore() -> Self {
        Self {
            fail_restore: true,
            ..Self::default()
        }
    }

    pub fn restore_calls(&self) -> usize {
        self.restored.borrow().len()
    }

    fn corrupt_partials(&self, sink: &mut dyn Write) {
        let Some(dir) = &self.corrupt_partials_in else {
            return;
        };

        // Push enough incompressible bytes that the encoder reaches the file.
        let mut state: u32 = 0x2545_f491;
        let noise: Vec<u8> = (0..256 * 1024)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        sink.write_all(&noise).unwrap();
        sink.flush().unwrap();

        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.to_string_lossy().ends_with(".partial") {
                let file = OpenOptions::new().write(true).open(&path).unwrap();
                file.set_len(0).unwrap();
            }
        }
    }
}

impl DatabaseTool for FakeTool {
    fn describe(&self) -> String {
        "fake tool".to_string()
    }

    fn dump(&self, sink: &mut dyn Write) -> VaultResult<()> {
        self.dump_calls.set(self.dump_calls.get() + 1);
        sink.write_all(&self.dump_output)
            .map_err(|e| VaultError::WriteFailed(e.to_string()))?;
        self.corrupt_partials(sink);

        if self.fail_dump {
            return Err(primitive_failure("pg_dump"));
        }
        Ok(())
    }

    fn restore(&self, source: &mut dyn Read) -> VaultResult<()> {
        let mut applied = Vec::new();
        source.read_to_end(&mut applied)?;
        self.restored.borrow_mut().push(applied);

        if self.fail_restore {
            return Err(primitive_failure("psql"));
        }
        Ok(())
    }
}

/// Operator that replays canned answers and records every prompt
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            notices: Vec::new(),
        }
    }
}

impl Operator for ScriptedOperator {
    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    /// Running out of answers behaves like EOF on stdin
    fn ask(&mut self, prompt: &str) -> VaultResult<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}
