// src/report.rs

use crate::accumulator::Summary;
use crate::config::{Config, MetricSet};
use crate::error::Result;
use crate::metrics::FrameMetrics;
use log::{debug, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// One processed frame.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Logical frame index, counted from the skip offsets.
    pub index: u64,
    #[serde(flatten)]
    pub metrics: FrameMetrics,
}

#[derive(Serialize, Debug)]
struct JsonReport<'a> {
    config: &'a Config,
    frames: &'a [FrameRecord],
    summary: &'a Summary,
}

struct ReporterState {
    out: Box<dyn Write + Send>,
    ordered: bool,
    next_index: u64,
    pending: BTreeMap<u64, FrameRecord>,
    records: Option<Vec<FrameRecord>>,
}

/// Writes per-frame lines and the closing averages to an output sink.
///
/// Frames arrive from worker threads in completion order. With `ordered`
/// set, lines are held back until every lower index has been written.
pub struct Reporter {
    metrics: MetricSet,
    state: Mutex<ReporterState>,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>, metrics: MetricSet, ordered: bool) -> Self {
        Reporter {
            metrics,
            state: Mutex::new(ReporterState {
                out,
                ordered,
                next_index: 0,
                pending: BTreeMap::new(),
                records: None,
            }),
        }
    }

    /// Also keep every record for [`Reporter::write_json`].
    pub fn keep_records(self) -> Self {
        self.state.lock().records = Some(Vec::new());
        self
    }

    pub fn header(&self) -> Result<()> {
        let mut line = String::from(" Frame");
        if self.metrics.psnr {
            line.push_str("    PSNR_Y    PSNR_U    PSNR_V");
        }
        if self.metrics.ssim {
            line.push_str("    SSIM_Y    SSIM_U    SSIM_V");
        }
        let mut state = self.state.lock();
        writeln!(state.out, "{}", line)?;
        Ok(())
    }

    pub fn frame(&self, record: FrameRecord) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(records) = state.records.as_mut() {
            records.push(record);
        }
        if !state.ordered {
            return write_frame(&mut state.out, &record);
        }

        state.pending.insert(record.index, record);
        loop {
            let next = state.next_index;
            let Some(ready) = state.pending.remove(&next) else {
                break;
            };
            write_frame(&mut state.out, &ready)?;
            state.next_index += 1;
        }
        Ok(())
    }

    /// Flushes any held-back frames, then writes the averages.
    pub fn finish(&self, summary: &Summary) -> Result<()> {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        if !pending.is_empty() {
            debug!("Flushing {} out-of-sequence frames", pending.len());
        }
        for record in pending.values() {
            write_frame(&mut state.out, record)?;
        }

        let mut line = String::from("Average");
        push_values(&mut line, summary.psnr, summary.ssim);
        writeln!(state.out, "{}", line)?;
        writeln!(state.out, "Frames: {}", summary.frames)?;
        state.out.flush()?;
        Ok(())
    }

    /// Writes configuration, kept records (by index) and summary as JSON.
    pub fn write_json(&self, path: &Path, config: &Config, summary: &Summary) -> Result<()> {
        let mut frames = self.state.lock().records.clone().unwrap_or_default();
        frames.sort_by_key(|record| record.index);
        let report = JsonReport {
            config,
            frames: &frames,
            summary,
        };
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Wrote JSON report: {}", path.display());
        Ok(())
    }
}

fn write_frame(out: &mut Box<dyn Write + Send>, record: &FrameRecord) -> Result<()> {
    let mut line = format!("{:6}", record.index + 1);
    push_values(&mut line, record.metrics.psnr, record.metrics.ssim);
    writeln!(out, "{}", line)?;
    Ok(())
}

/// Appends 10-character columns: PSNR to 4 decimals, SSIM to 3.
fn push_values(line: &mut String, psnr: Option<[f64; 3]>, ssim: Option<[f64; 3]>) {
    for value in psnr.into_iter().flatten() {
        line.push_str(&format!("   {:7.4}", value));
    }
    for value in ssim.into_iter().flatten() {
        line.push_str(&format!("    {:6.3}", value));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    /// Cloneable in-memory sink.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn record(index: u64) -> FrameRecord {
        FrameRecord {
            index,
            metrics: FrameMetrics {
                psnr: Some([index as f64, 0.0, 0.0]),
                ssim: None,
            },
        }
    }

    fn frame_numbers(text: &str) -> Vec<u64> {
        text.lines()
            .filter_map(|line| line.split_whitespace().next()?.parse().ok())
            .collect()
    }

    #[test]
    fn ordered_mode_writes_in_index_order() {
        let sink = SharedBuffer::default();
        let reporter = Reporter::new(Box::new(sink.clone()), MetricSet::PSNR, true);
        for index in [2, 0, 3, 1, 5] {
            reporter.frame(record(index)).unwrap();
        }
        assert_eq!(frame_numbers(&sink.contents()), vec![1, 2, 3, 4]);
        reporter
            .finish(&Summary { frames: 5, psnr: Some([0.0; 3]), ssim: None })
            .unwrap();
        assert_eq!(frame_numbers(&sink.contents()), vec![1, 2, 3, 4, 6]);
    }

    #[test]
    fn unordered_mode_writes_on_arrival() {
        let sink = SharedBuffer::default();
        let reporter = Reporter::new(Box::new(sink.clone()), MetricSet::PSNR, false);
        for index in [2, 0, 1] {
            reporter.frame(record(index)).unwrap();
        }
        assert_eq!(frame_numbers(&sink.contents()), vec![3, 1, 2]);
    }

    #[test]
    fn lines_follow_the_column_layout() {
        let sink = SharedBuffer::default();
        let reporter = Reporter::new(Box::new(sink.clone()), MetricSet::BOTH, false);
        reporter.header().unwrap();
        reporter
            .frame(FrameRecord {
                index: 0,
                metrics: FrameMetrics {
                    psnr: Some([99.9999; 3]),
                    ssim: Some([1.0; 3]),
                },
            })
            .unwrap();
        reporter
            .finish(&Summary {
                frames: 1,
                psnr: Some([99.9999; 3]),
                ssim: Some([1.0; 3]),
            })
            .unwrap();
        let text = sink.contents();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            " Frame    PSNR_Y    PSNR_U    PSNR_V    SSIM_Y    SSIM_U    SSIM_V"
        );
        assert_eq!(
            lines[1],
            "     1   99.9999   99.9999   99.9999     1.000     1.000     1.000"
        );
        assert!(lines[2].starts_with("Average"));
        assert_eq!(lines[3], "Frames: 1");
    }

    #[test]
    fn json_report_lists_frames_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let config = Config::new("ref.yuv".into(), "dst.yuv".into(), 16, 16);
        let reporter =
            Reporter::new(Box::new(std::io::sink()), MetricSet::PSNR, false).keep_records();
        reporter.frame(record(1)).unwrap();
        reporter.frame(record(0)).unwrap();
        let summary = Summary { frames: 2, psnr: Some([0.5, 0.0, 0.0]), ssim: None };
        reporter.write_json(&path, &config, &summary).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["frames"][0]["index"], 0);
        assert_eq!(json["frames"][1]["index"], 1);
        assert_eq!(json["summary"]["frames"], 2);
        assert_eq!(json["config"]["width"], 16);
    }
}
