use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use crossbeam_channel::bounded;
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use flate2::write::GzEncoder;
use flate2::Compression;

use thiserror::Error;

use tracing::{debug, info, warn};

use mzascore::source::{DtaTextSource, MzDataSpectrumSource, SpectrumSourceError};
use mzascore::{
    Fragmentation, LocalizationEngine, ParameterError, PeptideSpectrumMatch, ScoringParameters,
    SpectrumCache,
};

use crate::config::ScoringConfig;
use crate::proc::score_psms;
use crate::psm_reader::{PSMFormat, PSMReader, PSMReaderError};
use crate::types::{SpectrumSourceType, BUFFER_SIZE};
use crate::write::{
    collate_results, write_output, JsonLinesResultWriter, OutputFormat, ResultWriter,
    TsvResultWriter,
};

#[derive(Debug, Error)]
pub enum MZAScorerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read the configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("Invalid scoring parameters: {0}")]
    ParameterError(
        #[source]
        #[from]
        ParameterError,
    ),
    #[error("Failed to read PSMs: {0}")]
    PSMReaderError(
        #[source]
        #[from]
        PSMReaderError,
    ),
    #[error("Failed to read spectra: {0}")]
    SpectrumSourceError(
        #[source]
        #[from]
        SpectrumSourceError,
    ),
    #[error("Failed to write the scoring configuration: {0}")]
    TomlError(
        #[source]
        #[from]
        toml::ser::Error,
    ),
}

fn default_output_file() -> PathBuf {
    PathBuf::from("-")
}

fn default_write_buffer_size() -> usize {
    BUFFER_SIZE
}

fn default_threads() -> i32 {
    -1
}

/// Score the localization of post-translational modifications on peptide-spectrum matches.
///
/// Read a table of PSMs and the spectra they were identified from, score every placement
/// of each PSM's dynamic modifications with the AScore binomial model, and write one
/// result row per PSM.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZAScorer {
    /// The tab-delimited first-hits table of PSMs to score, optionally gzip compressed
    #[arg()]
    pub psm_file: PathBuf,

    /// The spectra the PSMs were identified from, either a concatenated DTA text file
    /// (`_dta.txt`) or an mzML or MGF file
    #[arg()]
    pub spectra_file: PathBuf,

    /// The path to write the results to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.json` or `.jsonl` are written as JSON lines, anything else as
    /// tab-separated values. A trailing `.gz` compresses the output.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// A TOML file of scoring parameters. When absent, the `scoring` table of the
    /// configuration is used, falling back to the built-in defaults.
    #[arg(short = 'p', long = "parameter-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_file: Option<PathBuf>,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzascorer.toml` in the working directory.
    /// Environment variables prefixed with `MZASCORER_` will be read too.
    #[arg(long = "config-file")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// The size of the buffer for queueing writing of results to the output stream.
    ///
    /// Making this longer consumes more memory but reduces the odds of the scoring
    /// threads waiting on the writer.
    #[arg(short = 'w', long = "write-buffer-size", default_value_t = BUFFER_SIZE)]
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(short = 't', long = "threads", default_value_t = -1)]
    #[serde(default = "default_threads")]
    pub threads: i32,

    /// The layout of the PSM table
    #[arg(short = 'f', long = "psm-format", value_enum, default_value_t = PSMFormat::Auto)]
    #[serde(default)]
    pub psm_format: PSMFormat,

    /// The fragmentation method of PSMs whose table row does not state one, overriding the
    /// scoring parameters' default
    #[arg(short = 'm', long = "fragmentation", value_parser = Fragmentation::from_str)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragmentation: Option<Fragmentation>,

    /// Write the effective scoring parameters to this path as TOML
    #[arg(long = "write-config")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_config: Option<PathBuf>,

    #[arg(skip)]
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl MZAScorer {
    fn create_threadpool(&self) -> io::Result<rayon::ThreadPool> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(io::Error::other)
    }

    /// The scoring configuration from `--parameter-file` if given, otherwise the
    /// configuration's own `scoring` table
    pub fn scoring_config(&self) -> Result<ScoringConfig, MZAScorerError> {
        match self.parameter_file.as_ref() {
            Some(path) => {
                if !path.exists() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("Parameter file {} not found", path.display()),
                    )
                    .into());
                }
                debug!("Reading scoring parameters from {}", path.display());
                let config = Figment::new().merge(Toml::file_exact(path)).extract()?;
                Ok(config)
            }
            None => Ok(self.scoring.clone()),
        }
    }

    pub fn scoring_parameters(&self) -> Result<ScoringParameters, MZAScorerError> {
        let config = self.scoring_config()?;
        if let Some(path) = self.write_config.as_ref() {
            info!("Writing scoring configuration to {}", path.display());
            fs::write(path, toml::to_string_pretty(&config)?)?;
        }
        let mut params = ScoringParameters::try_from(&config)?;
        if let Some(fragmentation) = self.fragmentation {
            params.default_fragmentation = fragmentation;
        }
        Ok(params)
    }

    pub fn main(&self) -> Result<(), MZAScorerError> {
        info!(
            "mzascorer v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("PSMs: {}", self.psm_file.display());
        info!("Spectra: {}", self.spectra_file.display());
        info!("Output: {}", self.output_file.display());

        let params = self.scoring_parameters()?;
        debug!("Scoring parameters: {params:?}");
        let engine = LocalizationEngine::new(params)?;

        let reader = PSMReader::open_path(&self.psm_file, self.psm_format)?;
        info!("Reading {} PSM table", reader.format());
        let psms = reader.read_all()?;
        info!("Read {} PSMs", psms.len());

        let source = open_spectra(&self.spectra_file)?;
        self.writer_then(engine, psms, source)
    }

    fn writer_then(
        &self,
        engine: LocalizationEngine,
        psms: Vec<PeptideSpectrumMatch>,
        source: SpectrumSourceType,
    ) -> Result<(), MZAScorerError> {
        let (format, compressed) = OutputFormat::infer_from_path(&self.output_file);
        let handle: Box<dyn io::Write + Send> = if self.output_file == Path::new("-") {
            Box::new(io::BufWriter::new(io::stdout()))
        } else {
            let handle = io::BufWriter::new(fs::File::create(&self.output_file)?);
            if compressed {
                Box::new(GzEncoder::new(handle, Compression::best()))
            } else {
                Box::new(handle)
            }
        };
        debug!("Writing {format:?} output (compressed? {compressed})");
        match format {
            OutputFormat::TSV => {
                self.run_workflow(engine, psms, source, TsvResultWriter::new(handle)?)
            }
            OutputFormat::JSONLines => {
                self.run_workflow(engine, psms, source, JsonLinesResultWriter::new(handle))
            }
        }
    }

    fn run_workflow<W: ResultWriter + Send + 'static>(
        &self,
        engine: LocalizationEngine,
        psms: Vec<PeptideSpectrumMatch>,
        source: SpectrumSourceType,
        writer: W,
    ) -> Result<(), MZAScorerError> {
        let buffer_size = self.write_buffer_size;
        let (send_scored, recv_scored) = bounded(buffer_size);
        let (send_collated, recv_collated) = bounded(buffer_size);

        let pool = self.create_threadpool()?;
        let engine = Arc::new(engine);
        let cache = Arc::new(SpectrumCache::new(source));

        let start = Instant::now();
        let score_task = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || pool.install(|| score_psms(&engine, &cache, psms, send_scored)))
        };

        let collate_task = thread::spawn(move || collate_results(recv_scored, send_collated));

        let write_task = thread::spawn(move || write_output(writer, recv_collated));

        match score_task.join() {
            Ok(prog) => {
                info!("PSMs: {}", prog.psms);
                info!(
                    "Localized: {} | Ambiguous: {} | Unambiguous: {}",
                    prog.localized, prog.ambiguous, prog.unambiguous
                );
                info!(
                    "Unlocalizable: {} | Unscored: {}",
                    prog.unlocalizable, prog.unscored
                );
                info!("Placements Scored: {}", prog.placements);
            }
            Err(e) => {
                warn!("Failed to join scoring task: {e:?}");
            }
        }
        debug!("Loaded {} spectra", cache.load_count());

        match collate_task.join() {
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to join collator task: {e:?}")
            }
        }

        match write_task.join() {
            Ok(o) => o?,
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
            }
        }

        info!("Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }
}

/// Open a spectrum source, choosing the DTA text reader for `.txt` files and `mzdata`
/// for everything else
fn open_spectra(path: &Path) -> Result<SpectrumSourceType, MZAScorerError> {
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    let source: SpectrumSourceType = if is_text {
        let source = DtaTextSource::open_path(path)?;
        info!("Indexed {} DTA spectra", source.len());
        Box::new(source)
    } else {
        let source = MzDataSpectrumSource::open_path(path)?;
        info!("Indexed {} MSn spectra", source.len());
        Box::new(source)
    };
    Ok(source)
}
