/// CSV input and output for posts and ranked records.
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CliError;

/// Serialise rows to CSV with a header line.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, CliError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|source| CliError::Csv { action: "marshal", source })?;
    }
    writer
        .into_inner()
        .map_err(|e| CliError::Csv { action: "marshal", source: e.into_error().into() })
}

/// Parse CSV with a header line into rows.
pub fn from_csv<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>, CliError> {
    csv::Reader::from_reader(data)
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| CliError::Csv { action: "unmarshal", source })
}

/// Read rows from a CSV file.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CliError> {
    let data = std::fs::read(path).map_err(|source| CliError::ReadInput { path: path.to_path_buf(), source })?;
    from_csv(&data)
}

/// Write rows to `output`, or print them to stdout when no path is given.
pub fn emit_rows<T: Serialize>(rows: &[T], output: Option<&Path>) -> Result<(), CliError> {
    let data = to_csv(rows)?;
    match output {
        Some(path) => {
            std::fs::write(path, &data)
                .map_err(|source| CliError::WriteOutput { path: path.to_path_buf(), source })?;
            println!("created file: {}", path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&data)),
    }
    Ok(())
}
