//! Line sources feeding the tracker actor.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::{Interval, MissedTickBehavior};

use super::{
    actor::TrackerHandle,
    errors::SessionError,
    messages::LineOrigin,
};
use crate::hardware::ProtocolFault;

/// Default poll cadence for [`FileTail`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[async_trait]
pub trait LineSource: Send {
    /// Next line, or `None` once the source is exhausted
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Fixed list of lines, used for replays and tests
#[derive(Debug, Default)]
pub struct ReplaySource {
    lines: VecDeque<String>,
}

impl ReplaySource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

#[async_trait]
impl LineSource for ReplaySource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Follows a growing protocol log file.
///
/// Hands out at most one line per tick, so a replayed backlog arrives at the
/// device's own cadence. Never returns `None`, and starts over from the top
/// when the file shrinks (rotation or truncation).
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    offset: u64,
    ticker: Interval,
    partial: String,
    pending: VecDeque<String>,
}

impl FileTail {
    /// Open `path` for tailing. With `from_start` the existing content is
    /// replayed first; otherwise only lines written after this call are read.
    pub async fn open(
        path: impl AsRef<Path>,
        from_start: bool,
        poll_interval: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let offset = if from_start {
            0
        } else {
            match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to stat {}", path.display()));
                }
            }
        };

        let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Tailing {} from byte {}", path.display(), offset);
        Ok(Self {
            path,
            offset,
            ticker,
            partial: String::new(),
            pending: VecDeque::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read whatever has been appended since the last poll
    async fn poll(&mut self) -> Result<()> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", self.path.display()));
            }
        };

        let len = file
            .metadata()
            .await
            .with_context(|| format!("Failed to stat {}", self.path.display()))?
            .len();
        if len < self.offset {
            warn!("{} shrank, reading from the start", self.path.display());
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        let read = file.read_to_end(&mut buf).await?;
        self.offset += read as u64;

        self.partial.push_str(&String::from_utf8_lossy(&buf));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            self.pending.push_back(line.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl LineSource for FileTail {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.ticker.tick().await;
            if self.pending.is_empty() {
                self.poll().await?;
            }
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
        }
    }
}

/// Why [`pump`] stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpStop {
    /// The source ran dry
    Exhausted,
    /// A line ended the session
    Fault(ProtocolFault),
    /// The actor went away
    Closed,
}

/// Summary returned by [`pump`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    pub forwarded: u64,
    pub stop: PumpStop,
}

/// Forward every non-blank line from `source` into the tracker
pub async fn pump<S>(mut source: S, handle: TrackerHandle) -> Result<PumpReport>
where
    S: LineSource,
{
    let mut forwarded = 0;

    loop {
        let Some(line) = source.next_line().await? else {
            return Ok(PumpReport {
                forwarded,
                stop: PumpStop::Exhausted,
            });
        };
        if line.trim().is_empty() {
            continue;
        }

        forwarded += 1;
        match handle.process_line(line, LineOrigin::Log).await {
            Ok(_) => {}
            Err(SessionError::Fault(fault)) => {
                debug!("Table {}: pump stopping on {}", handle.table(), fault);
                return Ok(PumpReport {
                    forwarded,
                    stop: PumpStop::Fault(fault),
                });
            }
            Err(SessionError::Closed) => {
                return Ok(PumpReport {
                    forwarded,
                    stop: PumpStop::Closed,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::GameState;
    use crate::session::{TrackerActor, device::LoggingDevice};

    #[tokio::test]
    async fn test_replay_source_drains_in_order() {
        let mut source = ReplaySource::new(["a", "b"]);
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("b"));
        assert_eq!(source.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pump_skips_blank_lines() {
        let (actor, handle) = TrackerActor::new(
            "T1",
            Box::new(LoggingDevice::new()),
            Duration::from_millis(100),
        );
        tokio::spawn(actor.run());

        let source = ReplaySource::new(["*X;1", "", "   ", "*X;2"]);
        let report = pump(source, handle.clone()).await.unwrap();

        assert_eq!(report.forwarded, 2);
        assert_eq!(report.stop, PumpStop::Exhausted);
        assert_eq!(
            handle.snapshot().await.unwrap().game_state,
            GameState::PlaceBet
        );
    }

    #[tokio::test]
    async fn test_pump_stops_on_fault() {
        let (actor, handle) = TrackerActor::new(
            "T1",
            Box::new(LoggingDevice::new()),
            Duration::from_millis(100),
        );
        tokio::spawn(actor.run());

        let source = ReplaySource::new(["*X;1", "garbage", "*X;2"]);
        let report = pump(source, handle).await.unwrap();

        assert_eq!(report.forwarded, 2);
        assert!(matches!(
            report.stop,
            PumpStop::Fault(ProtocolFault::UnknownCommand(_))
        ));
    }
}
