//! Reading events from comma separated files.
//!
//! The first non-empty line names the variables, every following line holds
//! one event. Lines starting with `#` are comments.

use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Options for filling binnings from CSV files.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Column holding per-event weights.
    pub weight_field: Option<String>,
    /// Constant factor applied to every event weight.
    pub weight: f64,
    /// Column renames applied before binning (old name -> new name).
    pub rename: HashMap<String, String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            weight_field: None,
            weight: 1.0,
            rename: HashMap::new(),
        }
    }
}

impl CsvOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weight_field(mut self, field: impl Into<String>) -> Self {
        self.weight_field = Some(field.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }
}

/// Read all events of a CSV file together with their weights.
pub fn read_events(path: &Path, options: &CsvOptions) -> BinningResult<(Vec<Event>, Vec<f64>)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let file_name = path.display().to_string();
    let csv_error = |line: usize, message: String| BinningError::Csv {
        file: file_name.clone(),
        line,
        message,
    };

    let mut header: Option<Vec<String>> = None;
    let mut weight_column = None;
    let mut events = Vec::new();
    let mut weights = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let lineno = n + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();

        let Some(columns) = &header else {
            let columns: Vec<String> = fields
                .iter()
                .map(|f| f.trim_matches('"').to_string())
                .collect();
            if let Some(field) = &options.weight_field {
                weight_column = Some(
                    columns
                        .iter()
                        .position(|c| c == field)
                        .ok_or_else(|| csv_error(lineno, format!("no weight column '{}'", field)))?,
                );
            }
            header = Some(columns);
            continue;
        };

        if fields.len() != columns.len() {
            return Err(csv_error(
                lineno,
                format!("expected {} fields, found {}", columns.len(), fields.len()),
            ));
        }
        let values = fields
            .iter()
            .map(|f| {
                f.parse::<f64>()
                    .map_err(|e| csv_error(lineno, format!("invalid number '{}': {}", f, e)))
            })
            .collect::<BinningResult<Vec<f64>>>()?;

        let weight = weight_column.map_or(1.0, |c| values[c]) * options.weight;
        let event: Event = columns.iter().cloned().zip(values).collect();
        events.push(event.renamed(&options.rename));
        weights.push(weight);
    }

    Ok((events, weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_weighted_events() {
        let file = csv_file("x, y, w\n# comment\n0.5, 10, 2\n1.5, 10, 3\n\n");
        let options = CsvOptions::new().with_weight_field("w").with_weight(0.5);
        let (events, weights) = read_events(file.path(), &options).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].get("x"), Some(1.5));
        assert_eq!(weights, vec![1.0, 1.5]);
    }

    #[test]
    fn test_rename_columns() {
        let file = csv_file("x,z\n0.5,10\n");
        let options = CsvOptions::new().with_rename("z", "y");
        let (events, weights) = read_events(file.path(), &options).unwrap();
        assert_eq!(events[0].get("y"), Some(10.0));
        assert_eq!(weights, vec![1.0]);
    }

    #[test]
    fn test_malformed_rows() {
        let file = csv_file("x,y\n0.5\n");
        assert!(matches!(
            read_events(file.path(), &CsvOptions::new()),
            Err(BinningError::Csv { line: 2, .. })
        ));
        let file = csv_file("x,y\n0.5,abc\n");
        assert!(read_events(file.path(), &CsvOptions::new()).is_err());
        let file = csv_file("x,y\n0.5,1\n");
        let options = CsvOptions::new().with_weight_field("w");
        assert!(read_events(file.path(), &options).is_err());
    }
}
