use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;

use clap::ValueEnum;
use csv::StringRecord;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use mzascore::{Fragmentation, PeptideSpectrumMatch};

/// The layout of a tab-delimited first-hits table
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PSMFormat {
    /// Detect the layout from the header
    #[default]
    Auto,
    /// `HitNum`, `ScanNum`, `ChargeState`, `Peptide`
    Sequest,
    /// `Result_ID`, `Scan`, `Charge`, `Peptide_Sequence`
    #[value(name = "xtandem")]
    XTandem,
    /// `ResultID`, `Scan`, `Charge`, `Peptide`
    #[value(name = "msgfplus")]
    MSGFPlus,
    /// `id`, `scan`, `charge`, `peptide`
    Generic,
}

impl Display for PSMFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PSMFormat::Auto => "auto",
            PSMFormat::Sequest => "sequest",
            PSMFormat::XTandem => "xtandem",
            PSMFormat::MSGFPlus => "msgfplus",
            PSMFormat::Generic => "generic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PSMReaderError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read the PSM table: {0}")]
    CSVError(
        #[source]
        #[from]
        csv::Error,
    ),
    #[error("Could not detect the PSM table format from its header: {0:?}")]
    UnknownFormat(Vec<String>),
    #[error("The {format} PSM table is missing the {column:?} column")]
    MissingColumn {
        format: PSMFormat,
        column: &'static str,
    },
    #[error("Invalid {column} value {value:?} on line {line}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

struct ColumnNames {
    id: &'static str,
    scan: &'static str,
    charge: &'static str,
    peptide: &'static str,
}

impl PSMFormat {
    fn column_names(&self) -> ColumnNames {
        match self {
            PSMFormat::Sequest => ColumnNames {
                id: "HitNum",
                scan: "ScanNum",
                charge: "ChargeState",
                peptide: "Peptide",
            },
            PSMFormat::XTandem => ColumnNames {
                id: "Result_ID",
                scan: "Scan",
                charge: "Charge",
                peptide: "Peptide_Sequence",
            },
            PSMFormat::MSGFPlus => ColumnNames {
                id: "ResultID",
                scan: "Scan",
                charge: "Charge",
                peptide: "Peptide",
            },
            PSMFormat::Generic | PSMFormat::Auto => ColumnNames {
                id: "id",
                scan: "scan",
                charge: "charge",
                peptide: "peptide",
            },
        }
    }

    /// Pick the format whose columns all appear in `headers`
    pub fn detect(headers: &StringRecord) -> Option<PSMFormat> {
        [
            PSMFormat::Sequest,
            PSMFormat::XTandem,
            PSMFormat::MSGFPlus,
            PSMFormat::Generic,
        ]
        .into_iter()
        .find(|format| {
            let names = format.column_names();
            [names.scan, names.charge, names.peptide]
                .iter()
                .all(|name| headers.iter().any(|h| h.trim() == *name))
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    id: Option<usize>,
    scan: usize,
    charge: usize,
    peptide: usize,
    fragmentation: Option<usize>,
}

impl ColumnIndices {
    fn find(headers: &StringRecord, format: PSMFormat) -> Result<Self, PSMReaderError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let names = format.column_names();
        let required = |name: &'static str| {
            position(name).ok_or(PSMReaderError::MissingColumn {
                format,
                column: name,
            })
        };
        Ok(Self {
            id: position(names.id),
            scan: required(names.scan)?,
            charge: required(names.charge)?,
            peptide: required(names.peptide)?,
            fragmentation: position("FragMethod").or_else(|| position("fragmentation")),
        })
    }
}

/// Reads [`PeptideSpectrumMatch`]es from a tab-delimited table
pub struct PSMReader<R: io::Read> {
    reader: csv::Reader<R>,
    format: PSMFormat,
    columns: ColumnIndices,
    row: usize,
}

impl PSMReader<Box<dyn io::Read>> {
    /// Open a table on disk, decompressing it if the path ends with `.gz`
    pub fn open_path<P: AsRef<Path>>(path: P, format: PSMFormat) -> Result<Self, PSMReaderError> {
        let path = path.as_ref();
        let handle = io::BufReader::new(fs::File::open(path)?);
        let stream: Box<dyn io::Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(MultiGzDecoder::new(handle))
        } else {
            Box::new(handle)
        };
        Self::new(stream, format)
    }
}

impl<R: io::Read> PSMReader<R> {
    pub fn new(stream: R, format: PSMFormat) -> Result<Self, PSMReaderError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(stream);
        let headers = reader.headers()?.clone();
        let format = match format {
            PSMFormat::Auto => PSMFormat::detect(&headers).ok_or_else(|| {
                PSMReaderError::UnknownFormat(headers.iter().map(|h| h.to_string()).collect())
            })?,
            format => format,
        };
        debug!("Reading PSMs in {format} format");
        let columns = ColumnIndices::find(&headers, format)?;
        Ok(Self {
            reader,
            format,
            columns,
            row: 0,
        })
    }

    pub fn format(&self) -> PSMFormat {
        self.format
    }

    fn parse_record(&mut self, record: &StringRecord) -> Result<PeptideSpectrumMatch, PSMReaderError> {
        self.row += 1;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |index: usize| record.get(index).unwrap_or_default().trim();
        let invalid = |column: &'static str, value: &str| PSMReaderError::InvalidValue {
            line,
            column,
            value: value.to_string(),
        };

        let scan = field(self.columns.scan);
        let scan_number: u32 = scan.parse().map_err(|_| invalid("scan", scan))?;
        let charge = field(self.columns.charge);
        let charge: i32 = charge.parse().map_err(|_| invalid("charge", charge))?;
        let peptide = field(self.columns.peptide).to_string();
        let id = self
            .columns
            .id
            .map(field)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .unwrap_or_else(|| self.row.to_string());
        let fragmentation = match self.columns.fragmentation.map(field) {
            Some(value) if !value.is_empty() => Some(
                value
                    .parse::<Fragmentation>()
                    .map_err(|_| invalid("fragmentation", value))?,
            ),
            _ => None,
        };

        Ok(PeptideSpectrumMatch {
            id,
            scan_number,
            charge,
            peptide,
            fragmentation,
        })
    }

    /// Read every remaining row
    pub fn read_all(mut self) -> Result<Vec<PeptideSpectrumMatch>, PSMReaderError> {
        let mut psms = Vec::new();
        let mut record = StringRecord::new();
        while self.reader.read_record(&mut record)? {
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            psms.push(self.parse_record(&record)?);
        }
        Ok(psms)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_detect_sequest() {
        let text = "HitNum\tScanNum\tScanCount\tChargeState\tPeptide\tFragMethod\n\
                    1\t1201\t1\t2\tK.AS*LDSPGESFK.L\tHCD\n\
                    2\t1305\t1\t3\tR.PEPT*IDEK.-\t\n";
        let reader = PSMReader::new(text.as_bytes(), PSMFormat::Auto).unwrap();
        assert_eq!(reader.format(), PSMFormat::Sequest);
        let psms = reader.read_all().unwrap();
        assert_eq!(psms.len(), 2);
        assert_eq!(psms[0].id, "1");
        assert_eq!(psms[0].scan_number, 1201);
        assert_eq!(psms[0].fragmentation, Some(Fragmentation::HCD));
        assert_eq!(psms[1].charge, 3);
        assert_eq!(psms[1].peptide, "R.PEPT*IDEK.-");
        assert_eq!(psms[1].fragmentation, None);
    }

    #[test]
    fn test_generic_without_id() {
        let text = "scan\tcharge\tpeptide\n7\t2\tPES*K\n\n9\t2\tPEPT*K\n";
        let psms = PSMReader::new(text.as_bytes(), PSMFormat::Auto)
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(psms.len(), 2);
        assert_eq!(psms[1].id, "2");
        assert_eq!(psms[1].scan_number, 9);
    }

    #[test]
    fn test_errors() {
        let text = "scan\tcharge\tpeptide\nseven\t2\tPES*K\n";
        let err = PSMReader::new(text.as_bytes(), PSMFormat::Auto)
            .unwrap()
            .read_all()
            .unwrap_err();
        assert!(matches!(err, PSMReaderError::InvalidValue { column: "scan", .. }));

        let text = "a\tb\tc\n1\t2\t3\n";
        assert!(matches!(
            PSMReader::new(text.as_bytes(), PSMFormat::Auto),
            Err(PSMReaderError::UnknownFormat(_))
        ));
        assert!(matches!(
            PSMReader::new(text.as_bytes(), PSMFormat::XTandem),
            Err(PSMReaderError::MissingColumn { column: "Scan", .. })
        ));
    }
}
