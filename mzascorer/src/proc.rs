use std::time::Instant;

use crossbeam_channel::Sender;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use mzascore::{LocalizationEngine, PeptideSpectrumMatch};

use crate::progress::ProgressRecord;
use crate::types::{IndexedResult, SpectrumCacheType};

/// Localize every PSM in parallel on the current thread pool, sending each result tagged
/// with the PSM's input index
pub fn score_psms(
    engine: &LocalizationEngine,
    cache: &SpectrumCacheType,
    psms: Vec<PeptideSpectrumMatch>,
    sender: Sender<IndexedResult>,
) -> ProgressRecord {
    let started = Instant::now();
    let n = psms.len();
    debug!("Scoring {n} PSMs on {} threads", rayon::current_num_threads());

    let prog: ProgressRecord = psms
        .into_par_iter()
        .enumerate()
        .map(|(i, psm)| {
            let result = engine.localize_cached(&psm, cache);
            let prog = ProgressRecord::from(&result);
            if let Err(e) = sender.send((i, result)) {
                warn!("Failed to send PSM {} ({i}) for writing: {e}", psm.id);
            }
            prog
        })
        .sum();

    let elapsed = started.elapsed();
    info!(
        "Scored {} PSMs against {} spectra in {:0.3?}",
        prog.psms,
        cache.len(),
        elapsed
    );
    prog
}
