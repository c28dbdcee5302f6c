use crate::types::job::{TargetType, target_text};
use crate::{Error, Result, util};

use serde_json::{Map, Value};
use std::fmt;

/// Placeholder left in signal commands; it must be replaced before dispatch.
pub const SIGNAL_PLACEHOLDER: &str = "<signalnumber>";

/// A command ready to be dispatched as a new job: target plus `<function> <args...>` text.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct Command {
    pub target_type: TargetType,
    pub target: String,
    pub text: String,
}

impl Command {
    pub fn new(target_type: TargetType, target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target_type,
            target: target.into(),
            text: text.into(),
        }
    }

    /// `true` while the command still contains `<signalnumber>`.
    pub fn needs_signal(&self) -> bool {
        self.text.contains(SIGNAL_PLACEHOLDER)
    }

    /// Copy of this command with `<signalnumber>` replaced by `signal`.
    pub fn with_signal(&self, signal: i32) -> Self {
        Self {
            target_type: self.target_type.clone(),
            target: self.target.clone(),
            text: self.text.replace(SIGNAL_PLACEHOLDER, &signal.to_string()),
        }
    }

    /// Split the command text into function, positional and keyword arguments.
    ///
    /// Fails on an unfilled signal placeholder, an empty target or an empty function.
    pub(crate) fn parse(&self) -> Result<ParsedCommand> {
        util::validate_no_control("target", &self.target)?;
        util::validate_no_control("command", &self.text)?;
        if self.target.trim().is_empty() {
            return Err(Error::invalid_input("target must not be empty"));
        }
        if self.needs_signal() {
            return Err(Error::invalid_input(format!(
                "command still contains {SIGNAL_PLACEHOLDER}; fill in a signal number first"
            )));
        }

        let mut tokens = tokenize(&self.text)?.into_iter();
        let Some(fun) = tokens.next() else {
            return Err(Error::invalid_input("command must not be empty"));
        };
        if fun.starts_with('"') || fun.contains('=') {
            return Err(Error::invalid_input(format!("invalid function name: {fun}")));
        }

        let mut args = Vec::new();
        let mut kwargs = Map::new();
        for token in tokens {
            match split_kwarg(&token) {
                Some((key, value)) => {
                    kwargs.insert(key.to_string(), parse_token(value)?);
                }
                None => args.push(parse_token(&token)?),
            }
        }

        Ok(ParsedCommand { fun, args, kwargs })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}",
            self.text,
            target_text(&self.target_type, &self.target)
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ParsedCommand {
    pub(crate) fun: String,
    pub(crate) args: Vec<Value>,
    pub(crate) kwargs: Map<String, Value>,
}

/// Render job arguments as ` arg1 arg2 key=value` (leading space per argument).
///
/// Objects tagged with `__kwarg__` expand into `key=value` pairs.
pub(crate) fn format_arguments(arguments: &[Value]) -> String {
    let mut out = String::new();
    for arg in arguments {
        if let Some(map) = arg.as_object()
            && map.get("__kwarg__").and_then(Value::as_bool) == Some(true)
        {
            for (key, value) in map {
                if key == "__kwarg__" {
                    continue;
                }
                out.push(' ');
                out.push_str(key);
                out.push('=');
                out.push_str(&format_value(value));
            }
            continue;
        }
        out.push(' ');
        out.push_str(&format_value(arg));
    }
    out
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) if needs_quoting(s) => Value::String(s.clone()).to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// A raw string must read back as the same string.
fn needs_quoting(s: &str) -> bool {
    if s.is_empty() || s.contains(char::is_whitespace) || s.contains('"') {
        return true;
    }
    if split_kwarg(s).is_some() {
        return true;
    }
    matches!(serde_json::from_str::<Value>(s), Ok(v) if !v.is_string())
}

fn split_kwarg(token: &str) -> Option<(&str, &str)> {
    if token.starts_with('"') {
        return None;
    }
    let (key, value) = token.split_once('=')?;
    let mut chars = key.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((key, value))
}

fn parse_token(token: &str) -> Result<Value> {
    if token.starts_with('"') {
        return serde_json::from_str::<Value>(token)
            .map_err(|e| Error::invalid_input(format!("invalid quoted argument {token}: {e}")));
    }
    match serde_json::from_str::<Value>(token) {
        Ok(v) => Ok(v),
        Err(_) => Ok(Value::String(token.to_string())),
    }
}

/// Split on whitespace, keeping JSON-quoted strings (with escapes) together.
fn tokenize(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_quotes {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c == '"' {
            in_quotes = true;
        }
        current.push(c);
    }

    if in_quotes {
        return Err(Error::invalid_input("unterminated quoted argument"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
