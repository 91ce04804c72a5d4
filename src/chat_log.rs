//! Chat line sources for the CLI: saved game logs and live log files.
//!
//! Game client logs look like
//!
//! ```text
//! [21:04:17] [Render thread/INFO]: [CHAT] You have joined [MVP+] Thyla's party!
//! ```
//!
//! Only `[CHAT]` entries are chat. In plain mode every line is taken as chat
//! text, which is handy for hand-written test transcripts.

use crate::core::state::Timestamp;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const CHAT_MARKER: &str = "[CHAT] ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub time: Option<NaiveTime>,
    pub text: String,
}

/// Pulls chat text out of a game log, one raw line at a time.
///
/// A `[CHAT]` entry may run over several physical lines. Lines without a time
/// prefix that follow it are continuations and come out as chat lines of their
/// own, stamped with the entry's time. Any other timestamped line closes the
/// entry.
#[derive(Debug, Clone, Default)]
pub struct ChatLogReader {
    plain: bool,
    /// Time of the open `[CHAT]` entry
    entry: Option<Option<NaiveTime>>,
}

impl ChatLogReader {
    pub fn new(plain: bool) -> Self {
        Self { plain, entry: None }
    }

    /// Next chat line, or None when `line` isn't chat
    pub fn feed(&mut self, line: &str) -> Option<LogLine> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some((head, text)) = line.split_once(CHAT_MARKER) {
            let time = leading_time(head);
            self.entry = Some(time);
            return Some(LogLine {
                time,
                text: text.to_string(),
            });
        }

        if line.trim().is_empty() {
            return None;
        }

        if self.plain {
            return Some(LogLine {
                time: None,
                text: line.to_string(),
            });
        }

        if leading_time(line).is_some() {
            self.entry = None;
            return None;
        }

        let time = self.entry?;
        Some(LogLine {
            time,
            text: line.to_string(),
        })
    }
}

/// "[HH:MM:SS] ..." prefix
fn leading_time(head: &str) -> Option<NaiveTime> {
    let rest = head.strip_prefix('[')?;
    let (time, _) = rest.split_once(']')?;
    NaiveTime::parse_from_str(time, "%H:%M:%S").ok()
}

/// Turns the time-of-day stamps of a log into increasing timestamps.
///
/// Logs only carry the time, so the clock starts on a given date and moves to
/// the next day whenever the time goes backwards.
#[derive(Debug, Clone)]
pub struct LogClock {
    date: NaiveDate,
    last_time: Option<NaiveTime>,
    current: Timestamp,
}

impl LogClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            last_time: None,
            current: date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Timestamp for the next line. Lines without a time reuse the last one.
    pub fn stamp(&mut self, time: Option<NaiveTime>) -> Timestamp {
        let Some(time) = time else {
            return self.current;
        };

        if let Some(last) = self.last_time {
            if time < last {
                self.date += Duration::days(1);
                debug!("Log clock rolled over to {}", self.date);
            }
        }
        self.last_time = Some(time);
        self.current = self.date.and_time(time).and_utc();
        self.current
    }

    pub fn now(&self) -> Timestamp {
        self.current
    }
}

/// Read a whole log file and keep the chat lines
pub fn read_log(path: &Path, plain: bool) -> Result<Vec<LogLine>> {
    let bytes = std::fs::read(path).context(format!("Failed to read log file: {:?}", path))?;
    // Client logs are not always valid UTF-8 (rank glyphs, odd encodings)
    let contents = String::from_utf8_lossy(&bytes);

    let mut reader = ChatLogReader::new(plain);
    let lines: Vec<LogLine> = contents.lines().filter_map(|line| reader.feed(line)).collect();
    info!("Read {} chat lines from {:?}", lines.len(), path);
    Ok(lines)
}

#[derive(Debug, Clone)]
pub enum SourceMessage {
    /// One complete raw line, newline removed
    Line(String),
    /// The file shrank and is being read again from the start
    Truncated,
    Closed,
}

/// Tail `path` from its current end, sending each complete line.
///
/// Polls for growth every `poll`. Returns when the receiver goes away or the
/// file can no longer be read.
pub async fn follow(
    path: &Path,
    tx: mpsc::UnboundedSender<SourceMessage>,
    poll: std::time::Duration,
) -> Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .context(format!("Failed to open log file: {:?}", path))?;
    let mut reader = BufReader::new(file);
    let mut position = reader.seek(std::io::SeekFrom::End(0)).await?;
    info!("Following {:?} from byte {}", path, position);

    let mut pending = String::new();
    loop {
        let mut chunk = Vec::new();
        let read = match reader.read_until(b'\n', &mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                error!("Error reading {:?}: {}", path, e);
                let _ = tx.send(SourceMessage::Closed);
                return Err(e.into());
            }
        };

        if read == 0 {
            // At EOF: wait for growth, restart if the file was truncated
            let len = tokio::fs::metadata(path)
                .await
                .context(format!("Failed to stat log file: {:?}", path))?
                .len();
            if len < position {
                info!("Log file {:?} was truncated, reading from start", path);
                position = reader.seek(std::io::SeekFrom::Start(0)).await?;
                pending.clear();
                if tx.send(SourceMessage::Truncated).is_err() {
                    return Ok(());
                }
                continue;
            }
            if tx.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(poll).await;
            continue;
        }

        position += read as u64;
        pending.push_str(&String::from_utf8_lossy(&chunk));

        // Writer may not have finished the line yet
        if !pending.ends_with('\n') {
            continue;
        }

        let line = pending.trim_end_matches(['\r', '\n']).to_string();
        pending.clear();
        if tx.send(SourceMessage::Line(line)).is_err() {
            debug!("Line receiver dropped, stopping follow");
            return Ok(());
        }
    }
}
