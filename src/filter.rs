use crate::errors::AppError;
use crate::model::ResponseRecord;
use regex::Regex;

/// Narrows what the record log writes.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub commands: Vec<String>,
    pub pattern: Option<Regex>,
}

impl RecordFilter {
    pub fn new(commands: &[String], pattern: Option<&str>) -> Result<Self, AppError> {
        let pattern = match pattern {
            Some(p) => Some(
                Regex::new(p).map_err(|e| AppError::Config(format!("bad --match pattern: {}", e)))?,
            ),
            None => None,
        };
        Ok(Self {
            commands: commands.iter().map(|c| c.to_uppercase()).collect(),
            pattern,
        })
    }

    pub fn accept(&self, r: &ResponseRecord) -> bool {
        if !self.commands.is_empty() && !self.commands.iter().any(|c| c == &r.command) {
            return false;
        }
        if let Some(re) = &self.pattern {
            if !re.is_match(&r.raw.line) {
                return false;
            }
        }
        true
    }
}
