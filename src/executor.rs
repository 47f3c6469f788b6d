use std::io;
use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::git::describe_code;

/// Runs an app's build instructions inside its checkout.
pub trait InstructionRunner {
    fn run(&self, dir: &Path, instructions: &[String]) -> Result<(), ExecutionError>;
}

#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("couldn't start process")]
    Spawn(#[from] io::Error),
    #[error("process exited with {}", describe_code(.code))]
    Exit { code: Option<i32> },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("instruction {index} is empty")]
    EmptyInstruction { index: usize },
    #[error("command \"{instruction}\" failed")]
    InstructionFailed {
        instruction: String,
        #[source]
        cause: StepFailure,
    },
}

/// Splits an instruction on whitespace into a program and its arguments.
///
/// Quotes, escapes and shell operators carry no meaning here: `echo "a b" | wc`
/// becomes the program `echo` with the literal arguments `"a`, `b"`, `|` and `wc`.
pub fn tokenize(instruction: &str) -> Option<(&str, Vec<&str>)> {
    let mut tokens = instruction.split_whitespace();
    let program = tokens.next()?;
    Some((program, tokens.collect()))
}

/// Executes instructions as direct process invocations with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl InstructionRunner for ProcessRunner {
    fn run(&self, dir: &Path, instructions: &[String]) -> Result<(), ExecutionError> {
        for (index, instruction) in instructions.iter().enumerate() {
            println!("==> [{}/{}] {}", index + 1, instructions.len(), instruction);

            let (program, args) =
                tokenize(instruction).ok_or(ExecutionError::EmptyInstruction { index })?;

            run_command(dir, program, &args).map_err(|cause| ExecutionError::InstructionFailed {
                instruction: instruction.clone(),
                cause,
            })?;
        }

        Ok(())
    }
}

fn run_command(dir: &Path, program: &str, args: &[&str]) -> Result<(), StepFailure> {
    tracing::debug!(dir = %dir.display(), program, ?args, "running build instruction");

    let status = Command::new(program).args(args).current_dir(dir).status()?;

    if !status.success() {
        return Err(StepFailure::Exit {
            code: status.code(),
        });
    }

    Ok(())
}
