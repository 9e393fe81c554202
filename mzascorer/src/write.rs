use std::io;
use std::path::Path;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use itertools::Itertools;
use mzdata::spectrum::utils::Collator;
use tracing::{debug, error, info};

use mzascore::LocalizationResult;

use crate::types::{IndexedResult, BUFFER_SIZE};

/// The result table layouts the program can write
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    TSV,
    JSONLines,
}

impl OutputFormat {
    /// Infer the format from a path's extension, looking past a trailing `.gz`
    pub fn infer_from_path(path: &Path) -> (Self, bool) {
        let compressed = path.extension().is_some_and(|ext| ext == "gz");
        let stem_path = if compressed {
            path.file_stem().map(Path::new).unwrap_or(path)
        } else {
            path
        };
        let format = match stem_path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("json") => {
                Self::JSONLines
            }
            _ => Self::TSV,
        };
        (format, compressed)
    }
}

pub trait ResultWriter {
    fn write(&mut self, result: &LocalizationResult) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;
}

pub const TSV_COLUMNS: [&str; 16] = [
    "psm_id",
    "scan",
    "charge",
    "peptide",
    "best_sequence",
    "peptide_score",
    "ascore",
    "status",
    "best_depth",
    "matched_ions",
    "possible_ions",
    "placements",
    "second_sequence",
    "site_scores",
    "site_determining_score",
    "error",
];

fn format_score(score: f64) -> String {
    format!("{score:.4}")
}

/// Site scores as `symbol position:score` pairs with 1-based positions, e.g. `*4:82.4521`
fn format_site_scores(result: &LocalizationResult) -> String {
    result
        .site_scores
        .iter()
        .map(|s| format!("{}{}:{:.4}", s.symbol, s.position + 1, s.score))
        .join(";")
}

/// Writes one tab-separated row per result after a header row
pub struct TsvResultWriter<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> TsvResultWriter<W> {
    pub fn new(handle: W) -> io::Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(handle);
        writer.write_record(TSV_COLUMNS)?;
        Ok(Self { writer })
    }
}

impl<W: io::Write> ResultWriter for TsvResultWriter<W> {
    fn write(&mut self, result: &LocalizationResult) -> io::Result<()> {
        let best = result.best();
        let record = [
            result.psm_id.clone(),
            result.scan_number.to_string(),
            result.charge.to_string(),
            result.peptide.clone(),
            result.best_sequence.clone().unwrap_or_default(),
            best.map(|b| format_score(b.score)).unwrap_or_default(),
            format_score(result.a_score),
            result.status.to_string(),
            best.map(|b| b.best_depth.to_string()).unwrap_or_default(),
            best.map(|b| b.matched_ions.to_string()).unwrap_or_default(),
            best.map(|b| b.possible_ions.to_string()).unwrap_or_default(),
            result.ranked.len().to_string(),
            result.second_sequence.clone().unwrap_or_default(),
            format_site_scores(result),
            result
                .site_determining_score
                .map(format_score)
                .unwrap_or_default(),
            result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        ];
        self.writer.write_record(&record)?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Writes each result as one JSON object per line
pub struct JsonLinesResultWriter<W: io::Write> {
    handle: W,
}

impl<W: io::Write> JsonLinesResultWriter<W> {
    pub fn new(handle: W) -> Self {
        Self { handle }
    }
}

impl<W: io::Write> ResultWriter for JsonLinesResultWriter<W> {
    fn write(&mut self, result: &LocalizationResult) -> io::Result<()> {
        serde_json::to_writer(&mut self.handle, result)?;
        self.handle.write_all(b"\n")
    }

    fn close(&mut self) -> io::Result<()> {
        self.handle.flush()
    }
}

fn drain_channel<T: Send>(
    collator: &mut Collator<T>,
    channel: &Receiver<(usize, T)>,
    batch_size: usize,
) -> bool {
    let mut j = 0;
    for b in 0..batch_size {
        match channel.try_recv() {
            Ok((idx, item)) => {
                collator.receive(idx, item);
                j += 1;
            }
            Err(e) => match e {
                TryRecvError::Empty => {
                    break;
                }
                TryRecvError::Disconnected => {
                    debug!("Work queue finished after draining {b} items from the work queue");
                    collator.done = true;
                    break;
                }
            },
        }
    }
    if j > batch_size / 2 {
        debug!("Drained {j} items from work queue");
    }
    collator.done
}

/// Restore input order to results arriving out of order from the scoring workers
pub(crate) fn collate_results(receiver: Receiver<IndexedResult>, sender: Sender<IndexedResult>) {
    let mut collator = Collator::default();
    let mut i = 0usize;
    let mut last_send = Instant::now();
    let mut has_work = true;
    while has_work {
        i += 1;
        if i == usize::MAX {
            info!("Collation counter rolling over");
            i = 1;
        }
        match receiver.recv_timeout(std::time::Duration::from_millis(50)) {
            Ok((idx, result)) => {
                collator.receive(idx, result);
                if drain_channel(&mut collator, &receiver, 1000)
                    && collator.done
                    && collator.waiting.is_empty()
                {
                    debug!("Setting collator loop condition to false");
                    has_work = false;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                collator.done = true;
                if collator.waiting.is_empty() {
                    debug!("Setting collator loop condition to false");
                    has_work = false;
                }
            }
        }

        let n = collator.waiting.len();
        if !collator.has_next() && n > 0 {
            let t = Instant::now();
            if (t - last_send).as_secs_f64() > 30.0 {
                let waiting_keys: Vec<_> =
                    collator.waiting.keys().sorted().take(10).copied().collect();
                info!(
                    "Collator holding {n} entries at tick {i}, next key {}, pending keys: {waiting_keys:?} with {} writing backlog",
                    collator.next_key,
                    sender.len(),
                );
                last_send = t;
            }
        }

        if collator.done && n > 0 {
            debug!("Draining output queue, {n} items");
            let mut waiting_items = std::mem::take(&mut collator.waiting)
                .into_iter()
                .collect_vec();
            waiting_items.sort_by(|(i, _), (j, _)| i.cmp(j));
            for (idx, result) in waiting_items {
                if let Err(e) = sender.send((idx, result)) {
                    error!("Failed to send {idx} for writing: {e}");
                    has_work = false;
                    break;
                }
            }
            has_work = false;
        } else {
            while let Some((idx, result)) = collator.try_next() {
                if collator.waiting.len() >= BUFFER_SIZE {
                    if let Err(e) = sender.send((idx, result)) {
                        error!("Failed to send {idx} for writing: {e}");
                        has_work = false;
                        break;
                    }
                } else {
                    match sender.try_send((idx, result)) {
                        Ok(()) => {}
                        Err(TrySendError::Full((idx, result))) => {
                            collator.receive(idx, result);
                            collator.set_next_key(idx);
                            break;
                        }
                        Err(TrySendError::Disconnected((idx, _))) => {
                            error!("Failed to send {idx} for writing: the writer hung up");
                            has_work = false;
                            break;
                        }
                    }
                }
            }
        }
        if collator.waiting.len() < n {
            last_send = Instant::now();
        }
    }
    debug!("Result collator done");
}

/// Write results in the order they arrive, reporting progress every 1000 PSMs
pub fn write_output<W: ResultWriter>(
    mut writer: W,
    receiver: Receiver<IndexedResult>,
) -> io::Result<()> {
    let mut counter = 0usize;
    let mut checkpoint = 0usize;
    while let Ok((idx, result)) = receiver.recv() {
        counter += 1;
        if counter - checkpoint >= 1000 {
            let queue_size = receiver.len();
            info!(
                "Completed PSM {} | {queue_size} items in the write queue",
                idx + 1
            );
            checkpoint = counter;
        }
        writer.write(&result)?;
    }
    if checkpoint != counter {
        info!("Finished | PSMs={counter}");
    }
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;
    use mzascore::{LocalizationError, PeptideSpectrumMatch};

    fn unscored(i: u32) -> LocalizationResult {
        let psm = PeptideSpectrumMatch::new(format!("psm-{i}"), i, 2, "PES*K");
        LocalizationResult::unscored(&psm, LocalizationError::SpectrumNotFound(i))
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(
            OutputFormat::infer_from_path(Path::new("out.tsv")),
            (OutputFormat::TSV, false)
        );
        assert_eq!(
            OutputFormat::infer_from_path(Path::new("out.jsonl.gz")),
            (OutputFormat::JSONLines, true)
        );
        assert_eq!(
            OutputFormat::infer_from_path(Path::new("-")),
            (OutputFormat::TSV, false)
        );
    }

    #[test]
    fn test_tsv_row() {
        let mut buffer = Vec::new();
        {
            let mut writer = TsvResultWriter::new(&mut buffer).unwrap();
            writer.write(&unscored(12)).unwrap();
            writer.close().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap().split('\t').count(), TSV_COLUMNS.len());
        let row: Vec<_> = lines.next().unwrap().split('\t').collect();
        assert_eq!(row.len(), TSV_COLUMNS.len());
        assert_eq!(row[0], "psm-12");
        assert_eq!(row[1], "12");
        assert_eq!(row[7], "unscored");
        assert_eq!(row[11], "0");
        assert!(row[15].contains("12"));
    }

    #[test]
    fn test_json_lines() {
        let mut buffer = Vec::new();
        {
            let mut writer = JsonLinesResultWriter::new(&mut buffer);
            writer.write(&unscored(1)).unwrap();
            writer.write(&unscored(2)).unwrap();
            writer.close().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        let values: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["psm_id"], "psm-2");
    }

    #[test]
    fn test_collate_restores_order() {
        let (send_scored, recv_scored) = crossbeam_channel::bounded(100);
        let (send_collated, recv_collated) = crossbeam_channel::bounded(100);
        let task = thread::spawn(move || collate_results(recv_scored, send_collated));
        for i in [3usize, 0, 4, 1, 2] {
            send_scored.send((i, unscored(i as u32))).unwrap();
        }
        drop(send_scored);
        let order: Vec<usize> = recv_collated.iter().map(|(i, _)| i).collect();
        task.join().unwrap();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }
}
