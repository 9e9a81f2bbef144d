//! Built-in response formatters.
//!
//! Field names follow the BCD396XT/BCD996XT Complete Reference. Most
//! responses only need a varlist; STS is variable length and brings its own
//! decode.

use crate::decoder::{self, Separator};
use crate::errors::AppError;
use crate::model::{Fields, RawResponse};
use crate::registry::FieldSpec;

pub const GLG_VARLIST: &[&str] = &[
    "CMD", "FRQ_TGID", "MOD", "ATT", "CTCSS_DCS", "NAME1", "NAME2", "NAME3", "SQL", "MUT",
    "SYS_TAG", "CHAN_TAG", "P25NAC",
];

const STS_VARLIST: &[&str] = &[
    "CMD", "DSP_FORM",
    "L1_CHAR", "L1_MODE", "L2_CHAR", "L2_MODE", "L3_CHAR", "L3_MODE", "L4_CHAR", "L4_MODE",
    "L5_CHAR", "L5_MODE", "L6_CHAR", "L6_MODE", "L7_CHAR", "L7_MODE", "L8_CHAR", "L8_MODE",
    "SQL", "MUT", "RSV", "BAT", "WAT", "SIG_LVL", "BK_COLOR", "BK_DIMMER",
];
const STS_FIRST_LINE: usize = 2;
const STS_MAX_LINES: usize = 8;
const STS_TAIL: usize = STS_FIRST_LINE + STS_MAX_LINES * 2;

const MDL_VARLIST: &[&str] = &["CMD", "MDL"];
const VER_VARLIST: &[&str] = &["CMD", "VER"];
const LEVEL_VARLIST: &[&str] = &["CMD", "LEVEL"];
const ACK_VARLIST: &[&str] = &["CMD", "RESP"];
const TST_VARLIST: &[&str] = &["CMD", "T1", "T2", "RSV1", "RSV2"];

pub fn builtin_specs() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("GLG", GLG_VARLIST).with_display(display_glg),
        FieldSpec::new("STS", STS_VARLIST)
            .with_decode(decode_sts)
            .with_display(display_sts),
        FieldSpec::new("MDL", MDL_VARLIST).with_display(display_mdl),
        FieldSpec::new("VER", VER_VARLIST).with_display(display_ver),
        FieldSpec::new("VOL", LEVEL_VARLIST).with_display(display_vol),
        FieldSpec::new("SQL", LEVEL_VARLIST).with_display(display_sql),
        FieldSpec::new("KEY", ACK_VARLIST),
        FieldSpec::new("TST", TST_VARLIST).with_display(display_tst),
    ]
}

fn display_glg(f: &Fields) -> Result<String, AppError> {
    Ok(format!(
        "Sys={}, Group={}, Chan={}, Freq={}, SQL={}, MUT={}",
        f.require("NAME1")?,
        f.require("NAME2")?,
        f.require("NAME3")?,
        f.require("FRQ_TGID")?,
        f.require("SQL")?,
        f.require("MUT")?,
    ))
}

/// DSP_FORM carries one character per display line in use. Lines beyond it
/// are not sent, so their CHAR/MODE names are dropped before decoding.
fn decode_sts(raw: &RawResponse, sep: Separator) -> Fields {
    let tokens = sep.tokens(&raw.line);
    let lines = tokens
        .get(1)
        .map(|form| form.chars().count().min(STS_MAX_LINES))
        .unwrap_or(0);

    let varlist: Vec<&str> = STS_VARLIST[..STS_FIRST_LINE + lines * 2]
        .iter()
        .chain(&STS_VARLIST[STS_TAIL..])
        .copied()
        .collect();
    decoder::assign(&tokens, &varlist, sep)
}

fn display_sts(f: &Fields) -> Result<String, AppError> {
    let form = f.require("DSP_FORM")?;
    if form.is_empty() {
        return Err(AppError::Parse("empty DSP_FORM".into()));
    }
    let lines = form.chars().count().min(STS_MAX_LINES);
    let mut parts = Vec::with_capacity(lines);
    for i in 1..=lines {
        let text = f.require(&format!("L{}_CHAR", i))?;
        parts.push(format!("L{}:{}", i, text));
    }
    Ok(parts.join(", "))
}

fn display_mdl(f: &Fields) -> Result<String, AppError> {
    Ok(format!("Scanner model is {}", f.require("MDL")?))
}

fn display_ver(f: &Fields) -> Result<String, AppError> {
    Ok(format!("Scanner software {}", f.require("VER")?))
}

/// `VOL,OK` and friends acknowledge a set command rather than report a level.
fn level_ack(f: &Fields) -> Result<Option<String>, AppError> {
    Ok(match f.require("LEVEL")? {
        ack @ ("OK" | "NG" | "FER" | "ORER") => Some(format!("{} {}", f.require("CMD")?, ack)),
        _ => None,
    })
}

fn display_vol(f: &Fields) -> Result<String, AppError> {
    if let Some(ack) = level_ack(f)? {
        return Ok(ack);
    }
    Ok(match f.require("LEVEL")? {
        "0" => "Volume muted".to_string(),
        level => format!("Volume {}", level),
    })
}

fn display_sql(f: &Fields) -> Result<String, AppError> {
    if let Some(ack) = level_ack(f)? {
        return Ok(ack);
    }
    Ok(format!("Squelch {}", f.require("LEVEL")?))
}

fn display_tst(f: &Fields) -> Result<String, AppError> {
    Ok(format!(
        "CMD={}, T1={}, T2={}, RSV={}, RSV={}",
        f.require("CMD")?,
        f.require("T1")?,
        f.require("T2")?,
        f.require("RSV1")?,
        f.require("RSV2")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn raw(line: &str) -> RawResponse {
        RawResponse {
            seq: 7,
            line: line.to_string(),
            received: FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        }
    }

    const GLG_LINE: &str =
        "GLG,0463.0000,FM,0,0,Public Safety,EMS MED Channels,Med 1,1,0,NONE,NONE,NONE";

    #[test]
    fn glg_wire_line_decodes_and_displays() {
        let f = decoder::decode(&raw(GLG_LINE), GLG_VARLIST, Separator::Comma);
        assert_eq!(f.len(), GLG_VARLIST.len());
        assert_eq!(f.get("FRQ_TGID"), Some("0463.0000"));
        assert_eq!(f.get("NAME2"), Some("EMS MED Channels"));
        assert_eq!(f.get("P25NAC"), Some("NONE"));
        assert_eq!(
            display_glg(&f).unwrap(),
            "Sys=Public Safety, Group=EMS MED Channels, Chan=Med 1, Freq=0463.0000, SQL=1, MUT=0"
        );
    }

    #[test]
    fn empty_glg_keeps_every_field() {
        let f = decoder::decode(&raw("GLG,,,,,,,,,,,,"), GLG_VARLIST, Separator::Comma);
        assert_eq!(f.len(), 13);
        assert!(f.iter().skip(1).all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn sts_drops_unused_display_lines() {
        let f = decode_sts(
            &raw("STS 0110 a1 m1 a2 m2 a3 m3 a4 m4 1 0 0 0 0 3 BLUE 2"),
            Separator::Whitespace,
        );
        assert_eq!(f.len(), 18);
        assert_eq!(f.get("L4_MODE"), Some("m4"));
        assert_eq!(f.get("L5_CHAR"), None);
        assert_eq!(f.get("SQL"), Some("1"));
        assert_eq!(f.get("SIG_LVL"), Some("3"));
        assert_eq!(f.get("BK_COLOR"), Some("BLUE"));
        assert_eq!(f.get("BK_DIMMER"), Some("2"));
        assert_eq!(display_sts(&f).unwrap(), "L1:a1, L2:a2, L3:a3, L4:a4");
    }

    #[test]
    fn sts_wire_line_keeps_padded_text() {
        let line = "STS,011000,        ????    ,,Fairfield County,,FAPERN VHF      ,, 154.1000 C151.4,,S0:12-*5*7*9-   ,,GRP----5-----   ,,1,0,0,0,0,0,5,GREEN,1";
        let f = decode_sts(&raw(line), Separator::Comma);
        assert_eq!(f.len(), 2 + 12 + 8);
        assert_eq!(f.get("L3_CHAR"), Some("FAPERN VHF      "));
        assert_eq!(f.get("L6_CHAR"), Some("GRP----5-----   "));
        assert_eq!(f.get("SQL"), Some("1"));
        assert_eq!(f.get("BK_DIMMER"), Some("GREEN,1"));
    }

    #[test]
    fn truncated_sts_does_not_panic() {
        let f = decode_sts(&raw("STS"), Separator::Whitespace);
        assert_eq!(f.get("CMD"), Some("STS"));
        assert_eq!(f.get("DSP_FORM"), Some(""));
        assert!(display_sts(&f).is_err());
    }

    #[test]
    fn simple_displays() {
        let f = decoder::decode(&raw("MDL BCD996XT"), MDL_VARLIST, Separator::Whitespace);
        assert_eq!(display_mdl(&f).unwrap(), "Scanner model is BCD996XT");
        let f = decoder::decode(&raw("VER Version 1.04.00"), VER_VARLIST, Separator::Whitespace);
        assert_eq!(display_ver(&f).unwrap(), "Scanner software Version 1.04.00");
        let f = decoder::decode(&raw("VOL 0"), LEVEL_VARLIST, Separator::Whitespace);
        assert_eq!(display_vol(&f).unwrap(), "Volume muted");
        let f = decoder::decode(&raw("VOL 12"), LEVEL_VARLIST, Separator::Whitespace);
        assert_eq!(display_vol(&f).unwrap(), "Volume 12");
    }

    #[test]
    fn level_acknowledgements_are_not_levels() {
        let f = decoder::decode(&raw("VOL,OK"), LEVEL_VARLIST, Separator::Comma);
        assert_eq!(display_vol(&f).unwrap(), "VOL OK");
        let f = decoder::decode(&raw("VOL,NG"), LEVEL_VARLIST, Separator::Comma);
        assert_eq!(display_vol(&f).unwrap(), "VOL NG");
        let f = decoder::decode(&raw("SQL,FER"), LEVEL_VARLIST, Separator::Comma);
        assert_eq!(display_sql(&f).unwrap(), "SQL FER");
        let f = decoder::decode(&raw("SQL,4"), LEVEL_VARLIST, Separator::Comma);
        assert_eq!(display_sql(&f).unwrap(), "Squelch 4");
    }
}
