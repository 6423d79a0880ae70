//! Durable sinks of the streaming export: a compact binary log and a
//! decoded textual log.
//!
//! Both files are truncated at open (fresh-run semantics, no append mode).
//! Records are written as whole units (one 16-byte block, one CSV line), so
//! neither log can hold a partial record. Writers carry large buffers to
//! amortize syscalls; the drain loop flushes after every non-empty batch so
//! a tailing consumer sees bounded-latency updates.

use std::fs::File;
use std::io::{BufWriter, Write};

use bustap_error::{Result, TapError};
use bustap_types::{CSV_HEADER, TraceFrame};

use crate::config::ExportConfig;

const WRITER_BUFFER_BYTES: usize = 1 << 20;

/// The pair of log writers owned by the drain thread.
#[derive(Debug)]
pub struct FrameSinks {
    binary: BufWriter<File>,
    text: BufWriter<File>,
}

impl FrameSinks {
    /// Create/truncate both logs and write the CSV header line.
    ///
    /// # Errors
    ///
    /// [`TapError::SinkOpen`] if either file cannot be created; fatal to
    /// the export path, never to capture.
    pub fn open(config: &ExportConfig) -> Result<Self> {
        let binary = File::create(&config.binary_path).map_err(|source| TapError::SinkOpen {
            path: config.binary_path.clone(),
            source,
        })?;
        let text = File::create(&config.text_path).map_err(|source| TapError::SinkOpen {
            path: config.text_path.clone(),
            source,
        })?;

        let mut sinks = Self {
            binary: BufWriter::with_capacity(WRITER_BUFFER_BYTES, binary),
            text: BufWriter::with_capacity(WRITER_BUFFER_BYTES, text),
        };
        writeln!(sinks.text, "{CSV_HEADER}")?;
        Ok(sinks)
    }

    /// Append one frame to both logs.
    pub fn append(&mut self, frame: &TraceFrame) -> Result<()> {
        self.binary.write_all(&frame.to_bytes())?;
        writeln!(self.text, "{}", frame.csv_line())?;
        Ok(())
    }

    /// Flush both logs to the OS.
    pub fn flush(&mut self) -> Result<()> {
        self.binary.flush()?;
        self.text.flush()?;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use bustap_types::{BusSource, FRAME_BYTES};

    use super::*;

    fn config_in(dir: &std::path::Path) -> ExportConfig {
        ExportConfig {
            binary_path: dir.join("frames.bin"),
            text_path: dir.join("frames.csv"),
            ..ExportConfig::default()
        }
    }

    fn frame(tag: u32) -> TraceFrame {
        TraceFrame {
            source: BusSource::Ram1,
            req_timestamp: tag,
            resp_timestamp: 0,
            address: 0x8000 + tag,
            data: tag,
            byte_enable: 0xF,
            write: true,
            valid: true,
            granted: true,
        }
    }

    #[test]
    fn append_writes_both_representations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let mut sinks = FrameSinks::open(&config).expect("sinks open");
        sinks.append(&frame(1)).expect("append");
        sinks.append(&frame(2)).expect("append");
        sinks.flush().expect("flush");

        let binary = std::fs::read(&config.binary_path).expect("binary log");
        assert_eq!(binary.len(), 2 * FRAME_BYTES);
        assert_eq!(
            TraceFrame::from_bytes(&binary[..FRAME_BYTES]).expect("decodes"),
            frame(1)
        );

        let text = std::fs::read_to_string(&config.text_path).expect("text log");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], frame(1).csv_line());
    }

    #[test]
    fn reopen_truncates_previous_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let mut sinks = FrameSinks::open(&config).expect("sinks open");
        for tag in 0..8 {
            sinks.append(&frame(tag)).expect("append");
        }
        sinks.flush().expect("flush");
        drop(sinks);

        let sinks = FrameSinks::open(&config).expect("reopen");
        drop(sinks);
        let binary = std::fs::read(&config.binary_path).expect("binary log");
        assert!(binary.is_empty(), "fresh-run semantics");
    }

    #[test]
    fn unwritable_path_is_a_sink_open_error() {
        let config = ExportConfig {
            binary_path: std::path::PathBuf::from("/nonexistent-dir/frames.bin"),
            ..ExportConfig::default()
        };
        let err = FrameSinks::open(&config).expect_err("open fails");
        assert!(matches!(err, TapError::SinkOpen { .. }));
    }
}
