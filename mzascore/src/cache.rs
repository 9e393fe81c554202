//! Load each spectrum at most once and share it between PSMs
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use identity_hash::BuildIdentityHasher;
use tracing::{debug, trace};

use crate::localizer::LocalizationError;
use crate::source::SpectrumLoader;
use crate::spectrum::Spectrum;

type CacheCell = Arc<OnceLock<Option<Arc<Spectrum>>>>;

/// A memoizing front for a [`SpectrumLoader`].
///
/// The outer map lock is only held long enough to find or insert the cell for a scan
/// number. The load itself runs inside the cell's [`OnceLock`], so concurrent requests for
/// the same uncached scan wait on one load while requests for other scans proceed. Misses
/// are remembered too.
pub struct SpectrumCache<L: SpectrumLoader> {
    loader: L,
    cells: Mutex<HashMap<u32, CacheCell, BuildIdentityHasher<u32>>>,
    loads: AtomicUsize,
}

impl<L: SpectrumLoader> std::fmt::Debug for SpectrumCache<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumCache")
            .field("len", &self.len())
            .field("loads", &self.load_count())
            .finish()
    }
}

impl<L: SpectrumLoader> SpectrumCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cells: Mutex::new(HashMap::default()),
            loads: AtomicUsize::new(0),
        }
    }

    fn cell_for(&self, scan_number: u32) -> CacheCell {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.entry(scan_number).or_default().clone()
    }

    /// Fetch the spectrum for `scan_number`, loading it on first use
    pub fn get(&self, scan_number: u32) -> Result<Arc<Spectrum>, LocalizationError> {
        let cell = self.cell_for(scan_number);
        let entry = cell.get_or_init(|| {
            self.loads.fetch_add(1, Ordering::Relaxed);
            let loaded = self.loader.load(scan_number);
            match loaded.as_ref() {
                Some(spectrum) => trace!("Loaded scan {scan_number} with {} peaks", spectrum.len()),
                None => debug!("Scan {scan_number} was not found"),
            }
            loaded.map(Arc::new)
        });
        entry
            .clone()
            .ok_or(LocalizationError::SpectrumNotFound(scan_number))
    }

    /// The number of times the loader has been called
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// The number of scans requested so far, found or not
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}
