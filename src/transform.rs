use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;

use crate::entry::Method;
use crate::error::TransformError;
use crate::sink::Sink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformRequest<'a> {
    pub method: Method,
    pub input: &'a Path,
    pub output: &'a Path,
    pub original_size: u64,
}

// Turns a staged payload into the final file (decompress, decrypt, copy...)
pub trait Transform {
    fn apply(&mut self, req: &TransformRequest<'_>, sink: &mut dyn Sink) -> Result<(), TransformError>;
}

/// Runs `<program> [args..] <method> <input> <output> <original_size>` per entry
///
/// The call blocks until the process exits, there is no timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTransform {
    program: String,
    args: Vec<String>,
}

impl CommandTransform {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandTransform {
            program: program.into(),
            args,
        }
    }

    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(CommandTransform::new(program.clone(), args.to_vec()))
    }
}

impl Transform for CommandTransform {
    fn apply(&mut self, req: &TransformRequest<'_>, sink: &mut dyn Sink) -> Result<(), TransformError> {
        debug!(
            "transform: {} {:?} {} {:?} {:?} {}",
            self.program,
            self.args,
            req.method.code(),
            req.input,
            req.output,
            req.original_size
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(req.method.code().to_string())
            .arg(req.input)
            .arg(req.output)
            .arg(req.original_size.to_string())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TransformError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            sink.write_line(line);
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(TransformError::Failed {
                code: output.status.code(),
            })
        }
    }
}
