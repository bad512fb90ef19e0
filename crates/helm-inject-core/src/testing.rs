//! Test doubles shared by the unit tests

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::exec::{CapturedOutput, CommandExecutor, Invocation};

type Responder = Box<dyn Fn(&Invocation) -> Result<CapturedOutput>>;

/// Executor that records every invocation and answers from a closure
pub struct RecordingExecutor {
    calls: RefCell<Vec<Invocation>>,
    responder: Responder,
}

impl RecordingExecutor {
    pub fn new(responder: impl Fn(&Invocation) -> Result<CapturedOutput> + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Executor whose commands all succeed with `stdout`
    pub fn replying(stdout: &'static str) -> Self {
        Self::new(move |_| Ok(CapturedOutput::stdout(stdout)))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CapturedOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        (self.responder)(invocation)
    }
}

/// Write an executable `/bin/sh` script named `name` into `dir`
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Create `relative` under `root` with `contents`, creating parents
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}
