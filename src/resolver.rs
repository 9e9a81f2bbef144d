use crate::decoder::{self, GENERIC_VARLIST, Separator};
use crate::model::{Fields, RawResponse};
use crate::registry::{DecodeFn, DisplayFn, FieldRegistry};
use log::debug;

#[derive(Clone, Copy, Debug)]
pub enum DecodeStrategy {
    Custom(DecodeFn),
    Varlist(&'static [&'static str]),
    Generic,
}

/// Decode and display routines chosen for one response.
#[derive(Clone, Debug)]
pub struct ResolvedStrategy {
    pub command: String,
    pub decode: DecodeStrategy,
    pub display: Option<DisplayFn>,
}

impl ResolvedStrategy {
    pub fn decode(&self, raw: &RawResponse, sep: Separator) -> Fields {
        match self.decode {
            DecodeStrategy::Custom(decode) => decode(raw, sep),
            DecodeStrategy::Varlist(varlist) => decoder::decode(raw, varlist, sep),
            DecodeStrategy::Generic => decoder::decode(raw, GENERIC_VARLIST, sep),
        }
    }
}

/// Pick the strategy for `raw` from its command key. Commands without a
/// formatter get the generic decode and no display.
pub fn resolve(registry: &FieldRegistry, raw: &RawResponse, sep: Separator) -> ResolvedStrategy {
    let command = decoder::command_key(&raw.line, sep);
    let Some(spec) = registry.lookup(&command) else {
        debug!("#{}: no formatter for {:?}, generic decode", raw.seq, command);
        return ResolvedStrategy {
            command,
            decode: DecodeStrategy::Generic,
            display: None,
        };
    };

    let decode = match (spec.decode, spec.varlist) {
        (Some(custom), _) => DecodeStrategy::Custom(custom),
        (None, []) => DecodeStrategy::Generic,
        (None, varlist) => DecodeStrategy::Varlist(varlist),
    };
    ResolvedStrategy {
        command,
        decode,
        display: spec.display,
    }
}
