//! Shell argument splitting for exported flag strings
//!
//! The exporter emits each flag as one string that may hold several
//! arguments or quoted paths. Splitting follows POSIX shell word rules:
//! - Unquoted whitespace separates words
//! - Single quotes preserve everything literally
//! - Double quotes allow `\` to escape `"`, `\`, `$`, `` ` `` and newline
//! - An unquoted backslash escapes the next character
//!
//! An unterminated quote does not fail: the partial word is kept.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Unquoted,
    Single,
    Double,
}

/// Split a flag string into arguments
pub fn split_arg_string(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut state = State::Unquoted;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Unquoted => match c {
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    state = State::Single;
                    in_word = true;
                }
                '"' => {
                    state = State::Double;
                    in_word = true;
                }
                '\\' => {
                    in_word = true;
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c => {
                    in_word = true;
                    current.push(c);
                }
            },
            State::Single => match c {
                '\'' => state = State::Unquoted,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Unquoted,
                '\\' => match chars.peek() {
                    Some(&next) if matches!(next, '"' | '\\' | '$' | '`' | '\n') => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push('\\'),
                },
                c => current.push(c),
            },
        }
    }

    if in_word {
        words.push(current);
    }

    words
}
