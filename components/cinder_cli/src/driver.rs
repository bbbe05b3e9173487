//! Script-file driver.

use interpreter::{InterpretError, Vm, VmOptions};

use crate::error::{CliError, CliResult};

/// Read and execute a script file in a fresh VM.
///
/// Compile errors are printed one diagnostic per line to stderr; runtime
/// errors are reported by the VM itself.
pub fn run_file(path: &str) -> CliResult<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|source| CliError::Io { path: path.to_string(), source })?;

    let mut vm = Vm::new(VmOptions::default());
    match vm.interpret(&source) {
        Ok(()) => Ok(()),
        Err(InterpretError::Compile(diagnostics)) => {
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic);
            }
            Err(InterpretError::Compile(diagnostics).into())
        }
        Err(error) => Err(error.into()),
    }
}
