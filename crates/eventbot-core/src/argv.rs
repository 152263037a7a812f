//! Shell-like splitting of chat command lines.
//!
//! Chat messages arrive as a single line of text. [`parse`] turns that line
//! into an argument vector the way a POSIX shell would for the simple cases:
//!
//! - whitespace separates arguments, runs of whitespace count once
//! - `"double"` and `'single'` quotes group words into one argument
//! - a backslash escapes the next character, except inside single quotes
//!
//! ```
//! use eventbot_core::argv::parse;
//!
//! let argv = parse(r#"schedule "Game Night" -d 'bring snacks' tomorrow"#).unwrap();
//! assert_eq!(argv, ["schedule", "Game Night", "-d", "bring snacks", "tomorrow"]);
//! ```

use std::fmt;

use thiserror::Error;

/// The construct left open at the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Single,
    Double,
    Backslash,
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single quote"),
            Self::Double => f.write_str("double quote"),
            Self::Backslash => f.write_str("backslash escape"),
        }
    }
}

/// Errors returned by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgvError {
    /// A quote or escape was still open when the input ended.
    #[error("unterminated {0} in command")]
    UnterminatedQuote(QuoteKind),
}

/// Splits `raw` into arguments.
///
/// # Errors
///
/// Returns [`ArgvError::UnterminatedQuote`] when the input ends inside a
/// quoted section or right after an unescaped backslash. No partial result is
/// returned in that case.
pub fn parse(raw: &str) -> Result<Vec<String>, ArgvError> {
    let mut argv = Vec::new();
    let mut current = String::new();

    let mut in_backslash = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut in_whitespace_run = true;

    for c in raw.chars() {
        let is_space = c.is_whitespace();
        if in_whitespace_run {
            if is_space {
                continue;
            }
            in_whitespace_run = false;
        }

        if in_backslash {
            in_backslash = false;
            current.push(c);
        } else if c == '\\' && !in_single_quote {
            in_backslash = true;
        } else if c == '"' && !in_single_quote {
            in_double_quote = !in_double_quote;
        } else if c == '\'' && !in_double_quote {
            in_single_quote = !in_single_quote;
        } else if is_space && !in_single_quote && !in_double_quote {
            in_whitespace_run = true;
            argv.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    if in_single_quote {
        return Err(ArgvError::UnterminatedQuote(QuoteKind::Single));
    }
    if in_double_quote {
        return Err(ArgvError::UnterminatedQuote(QuoteKind::Double));
    }
    if in_backslash {
        return Err(ArgvError::UnterminatedQuote(QuoteKind::Backslash));
    }
    if !in_whitespace_run {
        argv.push(current);
    }

    Ok(argv)
}
