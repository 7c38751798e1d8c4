/*!
 * Encoding-tolerant reader for Part D data files
 *
 * This module reads the pipe-delimited formulary and plan information
 * extracts into structured records. Source files are published in a mix of
 * text encodings, so each file is decoded by trying an ordered list of
 * candidate encodings and keeping the first that decodes cleanly.
 */

use std::path::Path;
use std::time::Instant;

use csv::ReaderBuilder;
use encoding_rs::Encoding;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Result, PartdError, ErrorContext,
    data_types::*,
    schema::*,
    constants::{DEFAULT_ENCODINGS, FIELD_DELIMITER},
};

/// Reader for Part D snapshot files with encoding fallback
pub struct SnapshotReader {
    /// Candidate encodings, attempted in order
    encodings: Vec<&'static Encoding>,
    /// Field delimiter (the CMS extracts use `|`)
    delimiter: u8,
    /// Whether to skip invalid rows (true) or fail on first error (false)
    skip_invalid_records: bool,
    /// Whether to show a progress bar while loading
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for SnapshotReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotReader {
    /// Create a new reader with default settings
    pub fn new() -> Self {
        Self {
            encodings: DEFAULT_ENCODINGS
                .iter()
                .map(|label| Encoding::for_label(label.as_bytes()).expect("default encoding label"))
                .collect(),
            delimiter: FIELD_DELIMITER,
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress_bar: true,
        }
    }

    /// Replace the candidate encoding list
    ///
    /// Labels are WHATWG encoding labels (`"utf-8"`, `"windows-1252"`, ...);
    /// an unrecognized label is a configuration error.
    pub fn with_encodings(mut self, labels: &[&str]) -> Result<Self> {
        let mut encodings = Vec::with_capacity(labels.len());
        for label in labels {
            let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                PartdError::Configuration {
                    message: format!("Unknown encoding label '{}'", label),
                    suggestion: Some(
                        "Use WHATWG encoding labels such as 'utf-8' or 'windows-1252'".to_string(),
                    ),
                }
            })?;
            encodings.push(encoding);
        }
        if encodings.is_empty() {
            return Err(PartdError::Configuration {
                message: "Candidate encoding list cannot be empty".to_string(),
                suggestion: None,
            });
        }
        self.encodings = encodings;
        Ok(self)
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Enable or disable skipping invalid rows
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load a formulary snapshot file
    pub fn load_formulary_data<P: AsRef<Path>>(&self, path: P) -> Result<Vec<FormularyRecord>> {
        let path = path.as_ref();
        self.load_file(path, "formulary rows", FormularySchema::resolve, |record, cols, line| {
            self.parse_formulary_record(record, cols, line)
        })
    }

    /// Load a plan information snapshot file
    pub fn load_plan_data<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PlanRecord>> {
        let path = path.as_ref();
        self.load_file(path, "plan rows", PlanSchema::resolve, |record, cols, line| {
            self.parse_plan_record(record, cols, line)
        })
    }

    /// Decode a file's bytes with the first candidate encoding that decodes
    /// without errors; aggregate failure lists every attempted label.
    fn decode_file(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        let mut attempted = Vec::with_capacity(self.encodings.len());

        for encoding in &self.encodings {
            let (text, _, had_errors) = encoding.decode(&bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
            attempted.push(encoding.name().to_string());
        }

        Err(PartdError::Decode {
            path: path.to_path_buf(),
            attempted,
        })
    }

    fn load_file<C, R>(
        &self,
        path: &Path,
        what: &str,
        resolve: impl Fn(&[String], &Path) -> Result<C>,
        parse: impl Fn(&csv::StringRecord, &C, usize) -> Result<R>,
    ) -> Result<Vec<R>> {
        if !path.exists() {
            return Err(PartdError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let text = self.decode_file(path)?;

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        let columns = resolve(&headers, path)?;

        let mut records = Vec::new();
        let mut invalid_count = 0;
        let start_time = Instant::now();

        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} {msg}")
                    .unwrap(),
            );
            pb.set_message(format!("Loading {}", path.display()));
            Some(pb)
        } else {
            None
        };

        for (idx, result) in reader.records().enumerate() {
            // +2 for the header row and 0-based index
            let line = idx + 2;

            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                if idx % 10_000 == 0 {
                    pb.tick();
                }
            }

            match result {
                Ok(csv_record) => match parse(&csv_record, &columns, line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        if self.skip_invalid_records {
                            invalid_count += 1;
                            if invalid_count <= 10 {
                                eprintln!("Warning: Skipping invalid row {}: {}", line, e);
                            }
                        } else {
                            return Err(e);
                        }
                    }
                },
                Err(e) => {
                    let error = PartdError::CsvParse {
                        message: e.to_string(),
                        line: Some(line),
                        context: ErrorContext {
                            file_path: Some(path.to_path_buf()),
                            line_number: Some(line),
                            ..Default::default()
                        },
                    };

                    if self.skip_invalid_records {
                        invalid_count += 1;
                        if invalid_count <= 10 {
                            eprintln!("Warning: {}", error);
                        }
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        let elapsed = start_time.elapsed();

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        #[cfg(feature = "progress")]
        if self.show_progress_bar {
            println!(
                "Loaded {} {} from {} in {:.2}s",
                records.len(),
                what,
                path.display(),
                elapsed.as_secs_f64()
            );
            if invalid_count > 0 {
                println!("Skipped {} invalid rows", invalid_count);
            }
        }

        #[cfg(not(feature = "progress"))]
        {
            println!(
                "Loaded {} {} from {} in {:.2}s",
                records.len(),
                what,
                path.display(),
                elapsed.as_secs_f64()
            );
            if invalid_count > 0 {
                println!("Skipped {} invalid rows", invalid_count);
            }
        }

        Ok(records)
    }

    /// Parse one formulary row
    fn parse_formulary_record(
        &self,
        record: &csv::StringRecord,
        columns: &FormularyColumns,
        line: usize,
    ) -> Result<FormularyRecord> {
        let get_field = |index: usize| record.get(index).map(str::trim).unwrap_or("");

        let ndc = Ndc::new(get_field(columns.ndc))?;

        let formulary_id = get_field(columns.formulary_id);
        if formulary_id.is_empty() {
            return Err(PartdError::DataValidation {
                message: "Missing FORMULARY_ID".to_string(),
                field: Some(FormularySchema::FORMULARY_ID.to_string()),
                value: None,
                context: ErrorContext {
                    line_number: Some(line),
                    record_ndc: Some(ndc.as_str().to_string()),
                    ..Default::default()
                },
            });
        }

        let tier_raw = get_field(columns.tier);
        let tier: u32 = tier_raw.parse().ok().filter(|t| *t > 0).ok_or_else(|| {
            PartdError::DataValidation {
                message: format!("TIER_LEVEL_VALUE must be a positive integer, found '{}'", tier_raw),
                field: Some(FormularySchema::TIER_LEVEL_VALUE.to_string()),
                value: Some(tier_raw.to_string()),
                context: ErrorContext {
                    line_number: Some(line),
                    record_ndc: Some(ndc.as_str().to_string()),
                    ..Default::default()
                },
            }
        })?;

        Ok(FormularyRecord {
            ndc,
            formulary_id: formulary_id.to_string(),
            tier,
            prior_auth: get_field(columns.prior_auth) == "Y",
            step_therapy: get_field(columns.step_therapy) == "Y",
        })
    }

    /// Parse one plan information row
    fn parse_plan_record(
        &self,
        record: &csv::StringRecord,
        columns: &PlanColumns,
        line: usize,
    ) -> Result<PlanRecord> {
        let get_field = |index: usize| record.get(index).map(str::trim).unwrap_or("");

        let get_required_field = |index: usize, field_name: &str| -> Result<String> {
            let value = get_field(index);
            if value.is_empty() {
                Err(PartdError::DataValidation {
                    message: format!("Missing required field: {}", field_name),
                    field: Some(field_name.to_string()),
                    value: None,
                    context: ErrorContext {
                        line_number: Some(line),
                        ..Default::default()
                    },
                })
            } else {
                Ok(value.to_string())
            }
        };

        Ok(PlanRecord {
            contract_id: get_required_field(columns.contract_id, PlanSchema::CONTRACT_ID)?,
            plan_id: get_required_field(columns.plan_id, PlanSchema::PLAN_ID)?,
            // names may legitimately be blank in older extracts
            contract_name: get_field(columns.contract_name).to_string(),
            plan_name: get_field(columns.plan_name).to_string(),
            formulary_id: get_required_field(columns.formulary_id, PlanSchema::FORMULARY_ID)?,
        })
    }
}
