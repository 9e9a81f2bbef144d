use crate::errors::AppError;
use chrono::{DateTime, FixedOffset};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One line from the scanner, tagged for ordering and log correlation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RawResponse {
    pub seq: u64,
    pub line: String,
    pub received: DateTime<FixedOffset>,
}

/// Acknowledgement state of a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// Command accepted.
    Ok,
    /// Command invalid at this time.
    Ng,
    /// Framing error.
    Fer,
    /// Overrun error.
    Orer,
    /// Command format or value error; the whole line is `ERR`.
    Err,
    /// A data response.
    Resp,
    /// Nothing to decode.
    #[serde(rename = "DECODEERROR")]
    DecodeError,
}

impl ResponseStatus {
    /// Classify a tokenized line. A two-token line whose second token is an
    /// acknowledgement code is an acknowledgement, anything else with content
    /// is a data response.
    pub fn classify(tokens: &[&str]) -> Self {
        match tokens {
            [] => ResponseStatus::DecodeError,
            [only] if only.trim().eq_ignore_ascii_case("ERR") => ResponseStatus::Err,
            [_, ack] => match ack.trim() {
                "OK" => ResponseStatus::Ok,
                "NG" => ResponseStatus::Ng,
                "FER" => ResponseStatus::Fer,
                "ORER" => ResponseStatus::Orer,
                _ => ResponseStatus::Resp,
            },
            _ => ResponseStatus::Resp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Ok => "OK",
            ResponseStatus::Ng => "NG",
            ResponseStatus::Fer => "FER",
            ResponseStatus::Orer => "ORER",
            ResponseStatus::Err => "ERR",
            ResponseStatus::Resp => "RESP",
            ResponseStatus::DecodeError => "DECODEERROR",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Ng | ResponseStatus::Fer | ResponseStatus::Orer | ResponseStatus::Err
        )
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded field values in varlist order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn with_capacity(n: usize) -> Self {
        Fields(Vec::with_capacity(n))
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Like `get`, for display routines that cannot render without the field.
    pub fn require(&self, name: &str) -> Result<&str, AppError> {
        self.get(name)
            .ok_or_else(|| AppError::Parse(format!("missing field {}", name)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The decoded result of one RawResponse. Shared read-only with consumers.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ResponseRecord {
    pub command: String,
    pub raw: RawResponse,
    pub status: ResponseStatus,
    pub fields: Fields,
    pub display: Option<String>,
}

impl ResponseRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_acknowledgements() {
        assert_eq!(ResponseStatus::classify(&["VOL", "OK"]), ResponseStatus::Ok);
        assert_eq!(ResponseStatus::classify(&["KEY", "NG"]), ResponseStatus::Ng);
        assert_eq!(ResponseStatus::classify(&["KEY", "FER"]), ResponseStatus::Fer);
        assert_eq!(ResponseStatus::classify(&["KEY", "ORER"]), ResponseStatus::Orer);
        assert_eq!(ResponseStatus::classify(&["ERR"]), ResponseStatus::Err);
        assert_eq!(ResponseStatus::classify(&[]), ResponseStatus::DecodeError);
    }

    #[test]
    fn classify_data_responses() {
        assert_eq!(ResponseStatus::classify(&["VOL", "12"]), ResponseStatus::Resp);
        assert_eq!(ResponseStatus::classify(&["MDL", "BCD996XT", "OK"]), ResponseStatus::Resp);
        assert_eq!(ResponseStatus::classify(&["GLG"]), ResponseStatus::Resp);
    }

    #[test]
    fn fields_keep_insertion_order() {
        let mut f = Fields::with_capacity(3);
        f.push("CMD", "GLG");
        f.push("CHAN", "12");
        f.push("FREQ", "462.550");
        let keys: Vec<&str> = f.keys().collect();
        assert_eq!(keys, vec!["CMD", "CHAN", "FREQ"]);
        assert_eq!(f.get("CHAN"), Some("12"));
        assert!(f.require("NOPE").is_err());

        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#"{"CMD":"GLG","CHAN":"12","FREQ":"462.550"}"#);
    }
}
