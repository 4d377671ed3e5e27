//! NIST MSP text libraries.
//!
//! Entries are blocks of `Key: value` header lines followed by `Num Peaks`
//! and the peak list, separated by blank lines. Peak pairs may be written one
//! per line or several per line separated by `;`.

use crate::errors::LibraryReadingError;
use crate::models::{
    CasNumber,
    ReferenceRecord,
    Spectrum,
};
use regex::Regex;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _#]*?)\s*:\s*(.*?)\s*$")
            .expect("MSP header pattern is a valid regex")
    })
}

fn peak_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]+(?:\.[0-9]*)?)[\s:,]+([0-9]+(?:\.[0-9]*)?(?:[eE][+-]?[0-9]+)?)")
            .expect("MSP peak pattern is a valid regex")
    })
}

#[derive(Default)]
struct PendingEntry {
    first_line: usize,
    name: Option<String>,
    synonyms: Vec<String>,
    formula: String,
    mw: u32,
    exact_mass: Option<f64>,
    cas: CasNumber,
    nist_no: u32,
    id: String,
    contributor: String,
    num_peaks: Option<usize>,
    peaks: Vec<(f64, f64)>,
}

impl PendingEntry {
    fn is_blank(&self) -> bool {
        self.name.is_none() && self.peaks.is_empty() && self.num_peaks.is_none()
    }

    fn set_header(
        &mut self,
        key: &str,
        value: &str,
        line: usize,
    ) -> Result<(), LibraryReadingError> {
        let bad_number = |what: &str| LibraryReadingError::MspParsingError {
            line,
            context: format!("invalid {} '{}'", what, value),
        };
        match key.to_ascii_lowercase().as_str() {
            "name" => self.name = Some(value.to_string()),
            "synon" => self.synonyms.push(value.to_string()),
            "formula" => self.formula = value.to_string(),
            "mw" => {
                let mw: f64 = value.parse().map_err(|_| bad_number("MW"))?;
                self.mw = mw.round() as u32;
            }
            "exactmass" | "exact mass" => {
                self.exact_mass = Some(value.parse().map_err(|_| bad_number("exact mass"))?);
            }
            "cas#" | "casno" | "cas" => {
                // `CAS#: 51-28-5; NIST#: 12345`
                let mut parts = value.split(';');
                let cas = parts.next().unwrap_or_default().trim();
                self.cas = CasNumber::parse(cas).unwrap_or_else(|e| {
                    debug!("Line {}: {}, storing unknown CAS", line, e);
                    CasNumber::Unknown
                });
                for part in parts {
                    if let Some((k, v)) = part.split_once(':') {
                        self.set_header(k.trim(), v.trim(), line)?;
                    }
                }
            }
            "nist#" | "nistno" => {
                self.nist_no = value.parse().map_err(|_| bad_number("NIST number"))?;
            }
            "db#" | "id" => self.id = value.to_string(),
            "contributor" => self.contributor = value.to_string(),
            "num peaks" => {
                self.num_peaks = Some(value.parse().map_err(|_| bad_number("peak count"))?);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<ReferenceRecord, LibraryReadingError> {
        let name = self.name.ok_or_else(|| LibraryReadingError::MspParsingError {
            line: self.first_line,
            context: "entry has no Name".into(),
        })?;
        if let Some(expected) = self.num_peaks {
            if expected != self.peaks.len() {
                return Err(LibraryReadingError::MspParsingError {
                    line: self.first_line,
                    context: format!(
                        "'{}' declares {} peaks but lists {}",
                        name,
                        expected,
                        self.peaks.len()
                    ),
                });
            }
        }
        let spectrum = if self.peaks.is_empty() {
            Spectrum::default()
        } else {
            Spectrum::from_peaks(self.peaks).map_err(|e| LibraryReadingError::MspParsingError {
                line: self.first_line,
                context: format!("'{}': {}", name, e),
            })?
        };

        let mut record = ReferenceRecord::new(name, self.cas, self.mw, spectrum);
        record.synonyms = self.synonyms;
        record.formula = self.formula;
        record.contributor = self.contributor;
        record.nist_no = self.nist_no;
        record.id = self.id;
        if let Some(exact_mass) = self.exact_mass.filter(|m| *m > 0.0) {
            record.exact_mass = exact_mass;
        }
        Ok(record)
    }
}

/// Lazily yields one record per MSP entry.
pub(crate) struct MspReader<R: BufRead> {
    reader: R,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> MspReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            done: false,
        }
    }

    fn read_entry(&mut self) -> Option<Result<ReferenceRecord, LibraryReadingError>> {
        let mut entry = PendingEntry::default();
        let mut in_peaks = false;
        let mut line = String::new();
        // Keeps consuming lines of a broken entry so the next call starts clean.
        let mut failure: Option<LibraryReadingError> = None;

        loop {
            line.clear();
            let read = match self.reader.read_line(&mut line) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(LibraryReadingError::FileReadingError {
                        source: e,
                        context: "Error reading MSP line",
                        path: PathBuf::new(),
                    }));
                }
            };
            if read == 0 {
                self.done = true;
                break;
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                if entry.is_blank() && failure.is_none() {
                    continue;
                }
                break;
            }
            if failure.is_some() {
                continue;
            }
            if entry.is_blank() {
                entry.first_line = self.line_number;
            }

            if !in_peaks {
                if let Some(caps) = header_pattern().captures(trimmed) {
                    let key = caps[1].to_string();
                    if let Err(e) = entry.set_header(&key, &caps[2], self.line_number) {
                        failure = Some(e);
                        continue;
                    }
                    if key.eq_ignore_ascii_case("num peaks") {
                        in_peaks = true;
                    }
                    continue;
                }
            }

            let mut found = false;
            for caps in peak_pattern().captures_iter(trimmed) {
                found = true;
                let mass = caps[1].parse::<f64>();
                let intensity = caps[2].parse::<f64>();
                match (mass, intensity) {
                    (Ok(m), Ok(i)) => entry.peaks.push((m, i)),
                    _ => {
                        failure = Some(LibraryReadingError::MspParsingError {
                            line: self.line_number,
                            context: format!("invalid peak '{}'", &caps[0]),
                        });
                        break;
                    }
                }
            }
            if !found && failure.is_none() {
                failure = Some(LibraryReadingError::MspParsingError {
                    line: self.line_number,
                    context: format!("unexpected line '{}'", trimmed),
                });
            }
        }

        if let Some(e) = failure {
            return Some(Err(e));
        }
        if entry.is_blank() {
            return None;
        }
        Some(entry.finish())
    }
}

impl<R: BufRead> Iterator for MspReader<R> {
    type Item = Result<ReferenceRecord, LibraryReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.read_entry()
    }
}
