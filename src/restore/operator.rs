//! The human on the other end of a restore

use std::io::{self, BufRead, Write};

use crate::error::VaultResult;

/// Channel for showing information to, and asking questions of, the operator
pub trait Operator {
    /// Show a message that needs no answer
    fn notify(&mut self, message: &str);

    /// Ask a question and return the raw answer
    ///
    /// End of input is returned as an empty answer.
    fn ask(&mut self, prompt: &str) -> VaultResult<String>;
}

/// Operator on the controlling terminal (stdout and stdin)
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn notify(&mut self, message: &str) {
        println!("{}", message);
    }

    fn ask(&mut self, prompt: &str) -> VaultResult<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut answer = String::new();
        let read = io::stdin().lock().read_line(&mut answer)?;
        if read == 0 {
            // Keep the terminal tidy when stdin closes mid-prompt.
            println!();
        }
        Ok(answer)
    }
}
