//! Offline inspector for BusTap binary trace logs.
//!
//! Decodes the 16-byte records of a binary log back into readable frames or
//! aggregate per-channel statistics, as text or JSON.

use std::ffi::OsString;
use std::io::Write;

use bustap_error::TapError;
use bustap_types::{FRAME_BYTES, SCAN_ORDER, TraceFrame};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    log_path: Option<String>,
    limit: Option<usize>,
    stats: bool,
    json: bool,
    show_help: bool,
}

#[derive(Debug, Serialize)]
struct LogStats {
    total_frames: u64,
    read_count: u64,
    write_count: u64,
    req_ts_min: Option<u32>,
    req_ts_max: Option<u32>,
    per_channel: Vec<ChannelStat>,
    undecodable: u64,
}

#[derive(Debug, Serialize)]
struct ChannelStat {
    channel: &'static str,
    frames: u64,
}

fn main() {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };

    if options.show_help {
        if write_usage(out).is_err() {
            return 1;
        }
        return 0;
    }

    let Some(path) = options.log_path.as_deref() else {
        let _ = writeln!(err, "error: missing log path");
        let _ = write_usage(err);
        return 2;
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            let _ = writeln!(err, "error: cannot read '{path}': {error}");
            return 1;
        }
    };

    let (frames, undecodable) = decode_log(&bytes);
    let trailing = bytes.len() % FRAME_BYTES;
    if trailing != 0 {
        let short = TapError::ShortRead {
            expected: FRAME_BYTES,
            actual: trailing,
        };
        let _ = writeln!(err, "warning: truncated trailing record ({short})");
    }
    if undecodable > 0 {
        let _ = writeln!(err, "warning: {undecodable} undecodable record(s) skipped");
    }

    let rendered = if options.stats {
        render_stats(&frames, undecodable, options.json, out)
    } else {
        render_frames(&frames, options.limit, options.json, out)
    };
    if rendered.is_err() {
        return 1;
    }
    if trailing != 0 { 1 } else { 0 }
}

fn decode_log(bytes: &[u8]) -> (Vec<TraceFrame>, u64) {
    let mut frames = Vec::with_capacity(bytes.len() / FRAME_BYTES);
    let mut undecodable = 0u64;
    for chunk in bytes.chunks_exact(FRAME_BYTES) {
        match TraceFrame::from_bytes(chunk) {
            Ok(frame) => frames.push(frame),
            Err(_) => undecodable += 1,
        }
    }
    (frames, undecodable)
}

fn render_frames(
    frames: &[TraceFrame],
    limit: Option<usize>,
    json: bool,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let shown = limit.unwrap_or(frames.len()).min(frames.len());
    if json {
        let body = serde_json::to_string_pretty(&frames[..shown])
            .expect("frames serialize to JSON");
        writeln!(out, "{body}")?;
    } else {
        for (index, frame) in frames[..shown].iter().enumerate() {
            writeln!(out, "{index:6}  {frame}")?;
        }
        if shown < frames.len() {
            writeln!(out, "... and {} more frame(s)", frames.len() - shown)?;
        }
    }
    Ok(())
}

fn render_stats(
    frames: &[TraceFrame],
    undecodable: u64,
    json: bool,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let stats = collect_stats(frames, undecodable);
    if json {
        let body = serde_json::to_string_pretty(&stats).expect("stats serialize to JSON");
        writeln!(out, "{body}")?;
        return Ok(());
    }

    writeln!(out, "total frames : {}", stats.total_frames)?;
    writeln!(out, "reads        : {}", stats.read_count)?;
    writeln!(out, "writes       : {}", stats.write_count)?;
    if let (Some(min), Some(max)) = (stats.req_ts_min, stats.req_ts_max) {
        writeln!(out, "req_ts range : {min} - {max}")?;
    }
    writeln!(out, "per channel  :")?;
    for entry in &stats.per_channel {
        writeln!(out, "  {:<10} {}", entry.channel, entry.frames)?;
    }
    if stats.undecodable > 0 {
        writeln!(out, "undecodable  : {}", stats.undecodable)?;
    }
    Ok(())
}

fn collect_stats(frames: &[TraceFrame], undecodable: u64) -> LogStats {
    let mut per_channel = [0u64; SCAN_ORDER.len()];
    let mut read_count = 0u64;
    let mut write_count = 0u64;
    let mut req_ts_min = None;
    let mut req_ts_max = None;

    for frame in frames {
        per_channel[frame.source.scan_index()] += 1;
        if frame.write {
            write_count += 1;
        } else {
            read_count += 1;
        }
        req_ts_min = Some(req_ts_min.map_or(frame.req_timestamp, |min: u32| {
            min.min(frame.req_timestamp)
        }));
        req_ts_max = Some(req_ts_max.map_or(frame.req_timestamp, |max: u32| {
            max.max(frame.req_timestamp)
        }));
    }

    LogStats {
        total_frames: u64::try_from(frames.len()).expect("frame count fits"),
        read_count,
        write_count,
        req_ts_min,
        req_ts_max,
        per_channel: SCAN_ORDER
            .iter()
            .zip(per_channel)
            .filter(|(_, count)| *count > 0)
            .map(|(source, frames)| ChannelStat {
                channel: source.name(),
                frames,
            })
            .collect(),
        undecodable,
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let mut options = CliOptions {
        log_path: None,
        limit: None,
        stats: false,
        json: false,
        show_help: false,
    };

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "--help" | "-h" => options.show_help = true,
            "--stats" => options.stats = true,
            "--json" => options.json = true,
            "--limit" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--limit requires a value".to_owned())?;
                let value = value.to_string_lossy();
                options.limit = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("invalid --limit value '{value}'"))?,
                );
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{other}'"));
            }
            _ => {
                if options.log_path.is_some() {
                    return Err("multiple log paths given".to_owned());
                }
                options.log_path = Some(arg.into_owned());
            }
        }
    }

    Ok(options)
}

fn write_usage(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "usage: bustap [OPTIONS] <frames.bin>")?;
    writeln!(out)?;
    writeln!(out, "Decode a BusTap binary trace log.")?;
    writeln!(out)?;
    writeln!(out, "options:")?;
    writeln!(out, "  --limit N   print at most N frames")?;
    writeln!(out, "  --stats     aggregate statistics instead of frames")?;
    writeln!(out, "  --json      machine-readable output")?;
    writeln!(out, "  -h, --help  this help")?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
