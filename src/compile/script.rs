//! Script compilation.
//!
//! Scripts either go through the built-in compiler, which checks that
//! delimiters and literals are well formed and wraps the file in a
//! closure so top-level names stay private:
//!
//! ```text
//! (function() {
//! <source>
//! }).call(this);
//! ```
//!
//! or are piped through an external compiler command configured in
//! `plugpack.toml` (for example `["coffee", "--stdio", "--print"]`).

use super::lexer::{tokenize, TokenKind};
use super::{CompileError, SourceCompiler};
use crate::build::SourceFile;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// How scripts are compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptMode {
    /// Validate and optionally wrap in a closure
    Builtin { bare: bool },
    /// Run an external program: source on stdin, output on stdout
    External { program: String, args: Vec<String> },
}

/// Compiles script sources.
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    mode: ScriptMode,
}

impl ScriptCompiler {
    /// Built-in compiler; `bare` skips the closure wrapper.
    pub fn builtin(bare: bool) -> Self {
        Self { mode: ScriptMode::Builtin { bare } }
    }

    /// Compiler backed by an external command line.
    ///
    /// An empty command falls back to the built-in compiler.
    pub fn from_command(command: &[String], bare: bool) -> Self {
        match command.split_first() {
            Some((program, args)) => Self {
                mode: ScriptMode::External { program: program.clone(), args: args.to_vec() },
            },
            None => Self::builtin(bare),
        }
    }

    /// The active compilation mode.
    pub fn mode(&self) -> &ScriptMode {
        &self.mode
    }

    /// Compile script `text` read from `file`.
    pub fn compile_str(&self, file: &Path, text: &str) -> Result<String, CompileError> {
        match &self.mode {
            ScriptMode::Builtin { bare } => {
                check_structure(file, text)?;
                if *bare {
                    Ok(text.trim_end().to_string())
                } else {
                    Ok(format!("(function() {{\n{}\n}}).call(this);", text.trim_end()))
                }
            }
            ScriptMode::External { program, args } => run_external(file, text, program, args),
        }
    }
}

impl SourceCompiler for ScriptCompiler {
    fn compile(&self, source: &SourceFile, text: &str) -> Result<String, CompileError> {
        self.compile_str(&source.path, text)
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Check that brackets balance and all literals and comments are closed.
pub fn check_structure(file: &Path, text: &str) -> Result<(), CompileError> {
    let tokens = tokenize(text)
        .map_err(|e| CompileError::with_location(file, e.line, e.column, e.message))?;

    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        let Some(c) = token.text.chars().next() else { continue };
        match c {
            '(' | '[' | '{' => stack.push((c, token.line, token.column)),
            ')' | ']' | '}' => match stack.pop() {
                Some((open, _, _)) if closing_for(open) == c => {}
                Some((open, line, column)) => {
                    return Err(CompileError::with_location(
                        file,
                        token.line,
                        token.column,
                        format!(
                            "expected '{}' to close '{}' from {}:{}, found '{}'",
                            closing_for(open),
                            open,
                            line,
                            column,
                            c
                        ),
                    ));
                }
                None => {
                    return Err(CompileError::with_location(
                        file,
                        token.line,
                        token.column,
                        format!("unexpected '{}'", c),
                    ));
                }
            },
            _ => {}
        }
    }

    if let Some((open, line, column)) = stack.pop() {
        return Err(CompileError::with_location(file, line, column, format!("unclosed '{}'", open)));
    }
    Ok(())
}

fn run_external(
    file: &Path,
    text: &str,
    program: &str,
    args: &[String],
) -> Result<String, CompileError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CompileError::new(file, format!("failed to run '{}': {}", program, e)))?;

    // Feed stdin from a separate thread so a chatty compiler cannot
    // deadlock on a full stdout pipe.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = text.to_owned();
        std::thread::spawn(move || stdin.write_all(input.as_bytes()))
    });

    let output = child
        .wait_with_output()
        .map_err(|e| CompileError::new(file, format!("failed to wait for '{}': {}", program, e)))?;

    if let Some(writer) = writer {
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => {
                return Err(CompileError::new(
                    file,
                    format!("failed to write to '{}': {}", program, e),
                ));
            }
            Err(_) => {
                return Err(CompileError::new(file, format!("stdin writer for '{}' panicked", program)));
            }
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("'{}' exited with {}", program, output.status),
            msg => msg.to_string(),
        };
        return Err(CompileError::new(file, message));
    }

    String::from_utf8(output.stdout)
        .map(|s| s.trim_end().to_string())
        .map_err(|_| CompileError::new(file, format!("'{}' produced non-UTF-8 output", program)))
}
