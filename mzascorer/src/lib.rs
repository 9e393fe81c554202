mod config;
mod driver;
mod proc;
mod progress;
mod psm_reader;
mod types;
mod write;

pub use config::{FragmentationConfig, ModificationConfig, ModificationKindConfig, ScoringConfig};
pub use driver::{MZAScorer, MZAScorerError};
pub use progress::ProgressRecord;
pub use psm_reader::{PSMFormat, PSMReader, PSMReaderError};
pub use write::{JsonLinesResultWriter, OutputFormat, ResultWriter, TsvResultWriter};
