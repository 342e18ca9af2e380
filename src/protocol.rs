//! Controller wire protocol: sentinel replies, shell-style tokenizing and
//! argument parsing shared by every command handler.

use thiserror::Error;

pub const INVALID_COMMAND: &str = "Invalid command";
pub const COMMAND_ERROR: &str = "An error ocurred running the command";
pub const INVALID_DEVICE: &str = "Invalid device";
pub const NULL: &str = "<<null>>";
pub const OK_LOWER: &str = "<<ok>>";
pub const ERR: &str = "<<err>>";
pub const OK: &str = "<<OK>>";
pub const UNKNOWN_PROPERTY: &str = "<<Unknown property>>";
pub const READ_ONLY_PROPERTY: &str = "<<This property can't be set>>";

/// Reply for a positional address outside `0..device_count`.
pub fn invalid_device_index(index: i64) -> String {
    format!("Error: Invalid device '{index}'")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("no closing quotation")]
    UnclosedQuote,
    #[error("no escaped character")]
    DanglingEscape,
}

/// Failure raised while running a matched command handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: usize, got: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("device has no child '{0}'")]
    MissingChild(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits a command line into words using POSIX shell rules.
///
/// Quotes group words containing whitespace. A backslash escapes the next
/// character outside quotes, and only `"` or `\` inside double quotes.
/// Single-quoted text is literal.
pub fn split(line: &str) -> Result<Vec<String>, ProtocolError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    word.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.peek() {
                    Some(&next) if next == '"' || next == '\\' => {
                        word.push(next);
                        chars.next();
                    }
                    Some(_) => word.push('\\'),
                    None => return Err(ProtocolError::UnclosedQuote),
                },
                _ => word.push(c),
            },
            Quote::None => match c {
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut word));
                        in_word = false;
                    }
                }
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars.next().ok_or(ProtocolError::DanglingEscape)?;
                    word.push(escaped);
                    in_word = true;
                }
                _ => {
                    word.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote != Quote::None {
        return Err(ProtocolError::UnclosedQuote);
    }
    if in_word {
        words.push(word);
    }

    Ok(words)
}

/// Renders a numeric reply.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

pub fn parse_number(text: &str) -> Result<f64, CommandError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| CommandError::InvalidNumber(text.to_string()))
}

/// Checks that a handler received exactly `N` arguments.
pub fn expect_args<const N: usize>(args: &[String]) -> Result<[&str; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::Arity {
            expected: N,
            got: args.len(),
        });
    }
    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_str();
    }
    Ok(out)
}
