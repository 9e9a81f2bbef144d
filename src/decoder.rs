use crate::errors::AppError;
use crate::model::{Fields, RawResponse};
use std::str::FromStr;

/// Varlist used when a command has no formatter of its own.
pub const GENERIC_VARLIST: &[&str] = &["CMD", "DATA"];

/// How a response line is cut into tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Separator {
    /// Runs of whitespace; empty tokens never appear.
    #[default]
    Whitespace,
    /// Every `,` (the scanner's wire format); empty fields are kept. Only the
    /// command token is trimmed.
    Comma,
}

impl Separator {
    pub fn tokens<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Separator::Whitespace => line.split_whitespace().collect(),
            Separator::Comma if line.is_empty() => Vec::new(),
            Separator::Comma => {
                let mut tokens: Vec<&str> = line.split(',').collect();
                if let Some(cmd) = tokens.first_mut() {
                    *cmd = cmd.trim();
                }
                tokens
            }
        }
    }

    /// Glue used when the last field absorbs surplus tokens.
    pub fn joiner(&self) -> &'static str {
        match self {
            Separator::Whitespace => " ",
            Separator::Comma => ",",
        }
    }
}

impl FromStr for Separator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "space" | "whitespace" | "ws" => Ok(Separator::Whitespace),
            "comma" | "," => Ok(Separator::Comma),
            other => Err(AppError::Config(format!("unknown separator '{}'", other))),
        }
    }
}

/// Upper-cased first token, the registry lookup key.
pub fn command_key(line: &str, sep: Separator) -> String {
    sep.tokens(line).first().copied().unwrap_or("").to_uppercase()
}

/// Positional decode of `raw` against `varlist`. An empty varlist means the
/// generic `CMD DATA` pair.
pub fn decode(raw: &RawResponse, varlist: &[&str], sep: Separator) -> Fields {
    let varlist = if varlist.is_empty() { GENERIC_VARLIST } else { varlist };
    let tokens = sep.tokens(&raw.line);
    assign(&tokens, varlist, sep)
}

/// Zip tokens onto names.
/// - surplus tokens are folded into the last name, rejoined by the separator
/// - names without a token get an empty string
pub fn assign(tokens: &[&str], varlist: &[&str], sep: Separator) -> Fields {
    let mut fields = Fields::with_capacity(varlist.len());
    let Some(last) = varlist.len().checked_sub(1) else {
        return fields;
    };

    for (i, name) in varlist.iter().enumerate() {
        let value = if i == last && tokens.len() > varlist.len() {
            tokens[i..].join(sep.joiner())
        } else {
            tokens.get(i).map(|t| t.to_string()).unwrap_or_default()
        };
        fields.push(*name, value);
    }
    fields
}
