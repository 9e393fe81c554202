use std::collections::HashMap;
use std::fs;
use std::io::{self, prelude::*, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::residues::PROTON;
use crate::spectrum::Spectrum;

use super::{SpectrumLoader, SpectrumSourceError};

/// The parts of a `=== "name.START.END.CHARGE.dta" ===` block header
#[derive(Debug, Clone, PartialEq, Eq)]
struct DtaHeader {
    start_scan: u32,
    end_scan: u32,
    charge: i32,
}

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with('=')
}

fn parse_header(line: &str) -> Option<DtaHeader> {
    let mut quoted = line.split('"');
    quoted.next()?;
    let name = quoted.next()?;
    let name = name.strip_suffix(".dta").unwrap_or(name);
    let mut parts = name.rsplitn(4, '.');
    let charge = parts.next()?.trim().parse().ok()?;
    let end_scan = parts.next()?.trim().parse().ok()?;
    let start_scan = parts.next()?.trim().parse().ok()?;
    Some(DtaHeader {
        start_scan,
        end_scan,
        charge,
    })
}

fn parse_pair<A: std::str::FromStr, B: std::str::FromStr>(line: &str) -> Option<(A, B)> {
    let mut tokens = line.split_whitespace();
    let a = tokens.next()?.parse().ok()?;
    let b = tokens.next()?.parse().ok()?;
    Some((a, b))
}

/// A spectrum source over a concatenated DTA text file (`_dta.txt`).
///
/// The file is scanned once when the source is created to record the byte offset of each
/// scan's block, and blocks are parsed on demand. When a scan appears more than once,
/// for instance at several charge states, the first block is used.
#[derive(Debug)]
pub struct DtaTextSource<R: BufRead + Seek + Send> {
    handle: Mutex<R>,
    offsets: HashMap<u32, u64>,
}

impl DtaTextSource<io::BufReader<fs::File>> {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, SpectrumSourceError> {
        let handle = io::BufReader::new(fs::File::open(path.as_ref())?);
        Self::new(handle)
    }
}

impl<R: BufRead + Seek + Send> DtaTextSource<R> {
    pub fn new(mut handle: R) -> Result<Self, SpectrumSourceError> {
        let offsets = Self::build_index(&mut handle)?;
        debug!("Indexed {} scans from DTA text", offsets.len());
        Ok(Self {
            handle: Mutex::new(handle),
            offsets,
        })
    }

    fn build_index(handle: &mut R) -> Result<HashMap<u32, u64>, SpectrumSourceError> {
        handle.seek(SeekFrom::Start(0))?;
        let mut offsets = HashMap::new();
        let mut offset = 0u64;
        let mut line = String::new();
        let mut line_number = 0;
        loop {
            line.clear();
            let n = handle.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            line_number += 1;
            if is_header(&line) {
                let header = parse_header(&line).ok_or_else(|| {
                    SpectrumSourceError::MalformedHeader {
                        line: line_number,
                        text: line.trim().to_string(),
                    }
                })?;
                offsets.entry(header.start_scan).or_insert(offset);
            }
            offset += n as u64;
        }
        Ok(offsets)
    }

    /// The scan numbers present in the file
    pub fn scan_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.offsets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn read_block(&self, offset: u64) -> Result<Spectrum, SpectrumSourceError> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        handle.seek(SeekFrom::Start(offset))?;

        let mut line = String::new();
        handle.read_line(&mut line)?;
        let header = parse_header(&line).ok_or_else(|| SpectrumSourceError::MalformedHeader {
            line: 0,
            text: line.trim().to_string(),
        })?;

        let mut precursor: Option<(f64, i32)> = None;
        let mut pairs: Vec<(f64, f32)> = Vec::new();
        let mut line_number = 1;
        loop {
            line.clear();
            if handle.read_line(&mut line)? == 0 || is_header(&line) {
                break;
            }
            line_number += 1;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if precursor.is_none() {
                let parsed: (f64, i32) =
                    parse_pair(text).ok_or_else(|| SpectrumSourceError::MalformedHeader {
                        line: line_number,
                        text: text.to_string(),
                    })?;
                precursor = Some(parsed);
                continue;
            }
            let peak = parse_pair(text).ok_or_else(|| SpectrumSourceError::MalformedPeak {
                line: line_number,
                text: text.to_string(),
            })?;
            pairs.push(peak);
        }

        let (mh, mut charge) = precursor.unwrap_or((0.0, header.charge));
        if charge < 1 {
            charge = header.charge.max(1);
        }
        let precursor_mz = (mh + (charge - 1) as f64 * PROTON) / charge as f64;
        if header.end_scan != header.start_scan {
            debug!(
                "Scan {} is merged with scans through {}",
                header.start_scan, header.end_scan
            );
        }
        Ok(Spectrum::from_pairs(
            header.start_scan,
            precursor_mz,
            charge,
            pairs,
        ))
    }
}

impl<R: BufRead + Seek + Send> SpectrumLoader for DtaTextSource<R> {
    fn load(&self, scan_number: u32) -> Option<Spectrum> {
        let offset = *self.offsets.get(&scan_number)?;
        match self.read_block(offset) {
            Ok(spectrum) => Some(spectrum),
            Err(e) => {
                warn!("Failed to read scan {scan_number} from DTA text: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::residues::isclose;
    use mzpeaks::prelude::*;

    const TEXT: &str = r#"=================================== "sample.1201.1201.2.dta" ==================================
1001.50 2
200.1 15.0
350.7 120.5
501.25 33
=================================== "sample.1201.1201.3.dta" ==================================
1001.50 3
210.0 5
=================================== "sample.1305.1307.1.dta" ==================================
700.40 1
150.0 2.5

320.2 8.0
"#;

    #[test]
    fn test_parse_header() {
        let header = parse_header(r#"===== "data.set.12.14.3.dta" ====="#).unwrap();
        assert_eq!(
            header,
            DtaHeader {
                start_scan: 12,
                end_scan: 14,
                charge: 3
            }
        );
        assert!(parse_header("===== no name =====").is_none());
    }

    #[test]
    fn test_load_blocks() {
        let source = DtaTextSource::new(io::Cursor::new(TEXT.as_bytes())).unwrap();
        assert_eq!(source.len(), 2);

        let spectrum = source.load(1201).unwrap();
        assert_eq!(spectrum.precursor_charge, 2);
        assert_eq!(spectrum.len(), 3);
        assert!(isclose(spectrum.precursor_mz, (1001.50 + PROTON) / 2.0, 1e-9));
        let mzs: Vec<f64> = spectrum.peaks.iter().map(|p| p.mz()).collect();
        assert_eq!(mzs, vec![200.1, 350.7, 501.25]);

        let spectrum = source.load(1305).unwrap();
        assert_eq!(spectrum.precursor_charge, 1);
        assert_eq!(spectrum.len(), 2);
        assert!(isclose(spectrum.precursor_mz, 700.40, 1e-9));

        assert!(source.load(1306).is_none());
    }

    #[test]
    fn test_malformed() {
        let text = "=== \"bad.header.dta\" ===\n100.0 1\n";
        assert!(matches!(
            DtaTextSource::new(io::Cursor::new(text.as_bytes())),
            Err(SpectrumSourceError::MalformedHeader { line: 1, .. })
        ));
    }
}
