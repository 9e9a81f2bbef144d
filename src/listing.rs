use crate::errors::AppError;
use crate::registry::FieldRegistry;
use csv::Writer;
use std::io::Write;

/// Write the registry as CSV, one formatter per row.
pub fn write_registry<W: Write>(registry: &FieldRegistry, out: W) -> Result<(), AppError> {
    let mut wtr = Writer::from_writer(out);

    wtr.write_record(["command", "varlist", "custom_decode", "display"])
        .map_err(|e| AppError::IO(format!("csv write header: {}", e)))?;

    for spec in registry.specs() {
        let varlist = if spec.varlist.is_empty() { "CMD DATA".to_string() } else { spec.varlist.join(" ") };
        wtr.write_record([
            spec.command.as_str(),
            varlist.as_str(),
            if spec.decode.is_some() { "yes" } else { "no" },
            if spec.display.is_some() { "yes" } else { "no" },
        ])
        .map_err(|e| AppError::IO(format!("csv write row: {}", e)))?;
    }

    wtr.flush().map_err(|e| AppError::IO(format!("csv flush: {}", e)))?;
    Ok(())
}
