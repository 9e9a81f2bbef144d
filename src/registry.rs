use crate::decoder::Separator;
use crate::errors::AppError;
use crate::formatters;
use crate::model::{Fields, RawResponse};
use log::debug;
use std::collections::HashMap;

/// Command-specific decode, used instead of the positional decoder.
pub type DecodeFn = fn(&RawResponse, Separator) -> Fields;
/// Renders decoded fields for people.
pub type DisplayFn = fn(&Fields) -> Result<String, AppError>;

/// What the engine knows about one command's response.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub command: String,
    /// Empty means the generic `CMD DATA` pair.
    pub varlist: &'static [&'static str],
    pub decode: Option<DecodeFn>,
    pub display: Option<DisplayFn>,
}

impl FieldSpec {
    pub fn new(command: &str, varlist: &'static [&'static str]) -> Self {
        Self {
            command: command.to_uppercase(),
            varlist,
            decode: None,
            display: None,
        }
    }

    pub fn with_decode(mut self, decode: DecodeFn) -> Self {
        self.decode = Some(decode);
        self
    }

    pub fn with_display(mut self, display: DisplayFn) -> Self {
        self.display = Some(display);
        self
    }
}

/// Command -> FieldSpec table. Filled once at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    specs: HashMap<String, FieldSpec>,
    order: Vec<String>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in formatter.
    pub fn builtin() -> Result<Self, AppError> {
        let mut reg = Self::new();
        for spec in formatters::builtin_specs() {
            reg.register(spec)?;
        }
        debug!("registry: {} formatters", reg.len());
        Ok(reg)
    }

    /// Adds `spec`. A command can only be registered once; on conflict the
    /// registry is left untouched.
    pub fn register(&mut self, spec: FieldSpec) -> Result<(), AppError> {
        let key = spec.command.to_uppercase();
        if self.specs.contains_key(&key) {
            return Err(AppError::DuplicateCommand(key));
        }
        self.order.push(key.clone());
        self.specs.insert(key.clone(), FieldSpec { command: key, ..spec });
        Ok(())
    }

    /// `command` is a command key (upper case). Unknown commands are `None`.
    pub fn lookup(&self, command: &str) -> Option<&FieldSpec> {
        self.specs.get(command)
    }

    /// Specs in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &FieldSpec> {
        self.order.iter().filter_map(|k| self.specs.get(k))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
