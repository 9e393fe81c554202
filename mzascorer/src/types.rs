use mzascore::source::SpectrumLoader;
use mzascore::{LocalizationResult, SpectrumCache};

pub(crate) type SpectrumSourceType = Box<dyn SpectrumLoader>;
pub(crate) type SpectrumCacheType = SpectrumCache<SpectrumSourceType>;
pub(crate) type IndexedResult = (usize, LocalizationResult);
pub(crate) const BUFFER_SIZE: usize = 10_000;
