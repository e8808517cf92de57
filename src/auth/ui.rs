use std::fmt;
use std::io::{self, BufRead, Write};

use crate::auth::Registration;

#[derive(Debug, Clone)]
pub struct UiError {
    message: String,
}

impl UiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UiError {}

impl From<io::Error> for UiError {
    fn from(err: io::Error) -> Self {
        UiError::new(err.to_string())
    }
}

/// Print `prompt` and read one line, without the trailing newline.
/// End of input is an error so callers never loop on a closed stdin.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<String, UiError> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(UiError::new("Input closed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn prompt_login<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<(String, String), UiError> {
    let username = prompt_line(input, output, "Username: ")?;
    let password = prompt_line(input, output, "Password: ")?;
    Ok((username, password))
}

pub fn prompt_registration<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<Registration, UiError> {
    let username = prompt_line(input, output, "Username: ")?;
    let password = prompt_line(input, output, "Password: ")?;
    let confirm_password = prompt_line(input, output, "Confirm password: ")?;
    Ok(Registration {
        username,
        password,
        confirm_password,
    })
}
