//! REPL (Read-Eval-Print Loop) implementation.

use interpreter::{InterpretError, Vm, VmOptions};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::{CliError, CliResult};

/// Run the interactive REPL.
///
/// One VM lives for the whole session, so globals persist across lines.
/// Dot-commands control the session itself.
pub fn run_repl() -> CliResult<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| CliError::Readline(format!("failed to initialize editor: {}", e)))?;
    let mut vm = Vm::new(VmOptions::default());

    println!("Cinder {}", env!("CARGO_PKG_VERSION"));
    println!("Type '.help' for commands.");

    loop {
        match editor.readline("cinder> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                if trimmed.starts_with('.') {
                    if handle_command(trimmed) {
                        break;
                    }
                    continue;
                }

                let _ = editor.add_history_entry(&line);
                match vm.interpret(&line) {
                    Ok(()) => {}
                    Err(InterpretError::Compile(diagnostics)) => {
                        for diagnostic in &diagnostics {
                            eprintln!("{}", diagnostic);
                        }
                    }
                    // The VM already reported the message and backtrace.
                    Err(InterpretError::Runtime(_)) => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Press Ctrl-D or type '.quit' to exit");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                return Err(CliError::Readline(format!("readline error: {}", err)));
            }
        }
    }

    Ok(())
}

/// Handle a dot-command. Returns true when the REPL should exit.
fn handle_command(command: &str) -> bool {
    match command {
        ".help" => {
            println!("Commands:");
            println!("  .help     show this help");
            println!("  .quit     exit the REPL");
        }
        ".quit" | ".exit" => {
            println!("Goodbye!");
            return true;
        }
        _ => {
            println!("Unknown command: {}", command);
            println!("Type '.help' for available commands.");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_commands_exit() {
        assert!(handle_command(".quit"));
        assert!(handle_command(".exit"));
    }

    #[test]
    fn test_other_commands_continue() {
        assert!(!handle_command(".help"));
        assert!(!handle_command(".bogus"));
    }
}
