//! Lock-free motion diagnostics recorder.
//!
//! The motion controller pushes one sample per tick (target, raw reading,
//! filtered estimate, direction); a background thread drains the queue into a
//! CSV file. Recording never blocks the control path: when the queue is full
//! the sample is dropped silently.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;
use log::error;

const SAMPLE_QUEUE_CAPACITY: usize = 16_384;

#[derive(Debug, Clone, Copy)]
pub struct MotionSample {
    pub ts_ns: u64,
    pub target: i32,
    pub raw: i32,
    pub filtered: i32,
    pub direction: &'static str,
}

pub struct MotionRecorder {
    queue: Arc<ArrayQueue<MotionSample>>,
    run_start: Instant,
    finished: Arc<AtomicBool>,
}

impl MotionRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(SAMPLE_QUEUE_CAPACITY)),
            run_start: Instant::now(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Nanoseconds since recorder creation.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    /// Appends a sample; drops it silently when the queue is full.
    #[inline]
    pub fn record(&self, sample: MotionSample) {
        let _ = self.queue.push(sample);
    }

    /// Spawns the drain thread writing one CSV row per sample. The thread
    /// exits once [`MotionRecorder::finish`] is called and the queue is empty.
    pub fn start_exporter(&self, output_csv: String) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();
        let finished = self.finished.clone();

        thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("[Recorder] failed to create {output_csv}: {e}");
                    return;
                }
            };
            let mut writer = BufWriter::new(file);
            let _ = writeln!(writer, "ts_ns,target,raw,filtered,direction");

            loop {
                match queue.pop() {
                    Some(s) => {
                        let _ = writeln!(
                            writer,
                            "{},{},{},{},{}",
                            s.ts_ns, s.target, s.raw, s.filtered, s.direction
                        );
                    }
                    None => {
                        if finished.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            }

            let _ = writer.flush();
        })
    }

    /// Signals the drain thread to flush remaining samples and exit.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

impl Default for MotionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MotionRecorder {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            run_start: self.run_start,
            finished: self.finished.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn samples_drain_to_csv() {
        let path = std::env::temp_dir().join(format!("thermovalve-rec-{}.csv", std::process::id()));
        let recorder = MotionRecorder::new();
        let handle = recorder.start_exporter(path.to_string_lossy().into_owned());

        for i in 0..5 {
            recorder.record(MotionSample {
                ts_ns: recorder.now_ns(),
                target: 8000,
                raw: 7000 + i,
                filtered: 7000 + i,
                direction: "up",
            });
        }
        recorder.finish();
        handle.join().unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("ts_ns,target,raw,filtered,direction"));
        assert_eq!(body.lines().count(), 6);
        fs::remove_file(&path).unwrap();
    }
}
