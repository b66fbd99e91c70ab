//! Timed replay of a captured PM5 notification log.
//!
//! The log is plain text with one event per line:
//!
//! ```text
//! <deltaMillis>:<hexPayload>
//! ```
//!
//! `deltaMillis` is the wait before the payload is sent, relative to the
//! previous event. Each payload is forwarded as-is to one sink, normally the
//! multiplexed-info characteristic. Bad lines are logged and skipped; one
//! malformed event never ends playback.

use bytes::Bytes;
use futures::future;
use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split},
    sync::oneshot,
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, warn};

use crate::{
    codec,
    error::{EmulatorError, Result},
    protocol::MAX_NOTIFY_SIZE,
    transport::NotifySink,
};

/// Default lower bound on the wait before each replayed notification
pub const MIN_REPLAY_DELAY: Duration = Duration::from_millis(50);

/// One parsed line of a replay log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEvent {
    /// Wait before sending, in milliseconds
    pub delta_millis: u64,
    /// Raw notification payload
    pub payload: Bytes,
}

impl ReplayEvent {
    /// Parse a `<deltaMillis>:<hexPayload>` line
    ///
    /// `line_number` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::InvalidReplayLine`] when the separator is
    /// missing, the delay is not a non-negative decimal integer, or the
    /// payload is not valid hex.
    pub fn parse(line: &str, line_number: usize) -> Result<Self> {
        let invalid = |reason: String| EmulatorError::InvalidReplayLine {
            line: line_number,
            reason,
        };

        let (delta, hex_payload) = line
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' separator".to_string()))?;

        let delta = delta.trim();
        if delta.is_empty() || !delta.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!("invalid delay {delta:?}")));
        }
        let delta_millis = delta
            .parse::<u64>()
            .map_err(|e| invalid(format!("invalid delay {delta:?}: {e}")))?;

        let payload = codec::decode(hex_payload.trim())
            .map_err(|e| invalid(format!("invalid payload: {e}")))?;

        Ok(Self {
            delta_millis,
            payload: Bytes::from(payload),
        })
    }

    /// Wait before this event is sent, never shorter than `min_delay`
    #[must_use]
    pub fn wait(&self, min_delay: Duration) -> Duration {
        Duration::from_millis(self.delta_millis).max(min_delay)
    }
}

/// Outcome of one pass over a replay log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Notifications delivered to the sink
    pub sent: usize,
    /// Malformed lines that were skipped
    pub skipped: usize,
    /// Whether playback reached the end of the log
    pub completed: bool,
}

/// Plays a replay log onto a notification sink
pub struct ReplayPlayer<R> {
    lines: Split<R>,
    source: String,
    min_delay: Duration,
}

impl ReplayPlayer<BufReader<File>> {
    /// Open a replay log file
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::ReplayLogUnavailable`] if the file cannot be
    /// opened. This is a configuration problem, reported once at startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .map_err(|source| EmulatorError::ReplayLogUnavailable {
                path: PathBuf::from(path),
                source,
            })?;

        let mut player = Self::from_reader(BufReader::new(file));
        player.source = path.display().to_string();
        Ok(player)
    }

    /// Open the log and play it from the start on a background task
    ///
    /// The file is reopened on every call, so each subscriber hears the
    /// whole log. Open failures end the task with
    /// [`EmulatorError::ReplayLogUnavailable`].
    pub fn spawn_file(
        path: impl Into<PathBuf>,
        min_delay: Duration,
        sink: Arc<dyn NotifySink>,
    ) -> ReplayHandle {
        let path = path.into();
        let (cancel, cancelled) = oneshot::channel();
        let handle = spawn_logged(async move {
            let player = Self::open(&path).await?.with_min_delay(min_delay);
            player.play_until(sink.as_ref(), cancelled).await
        });
        ReplayHandle {
            cancel: Some(cancel),
            handle,
        }
    }
}

impl<R> ReplayPlayer<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Play events read from any buffered async reader
    #[must_use]
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            source: "<reader>".to_string(),
            min_delay: MIN_REPLAY_DELAY,
        }
    }

    /// Override the minimum wait before each notification
    #[must_use]
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Play the whole log
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Io`] if reading the log fails part way.
    pub async fn play(self, sink: &dyn NotifySink) -> Result<ReplayStats> {
        self.run(sink, future::pending::<()>()).await
    }

    /// Play the log until it ends or `cancel` fires (or its sender is dropped)
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Io`] if reading the log fails part way.
    pub async fn play_until(
        self,
        sink: &dyn NotifySink,
        cancel: oneshot::Receiver<()>,
    ) -> Result<ReplayStats> {
        self.run(sink, async {
            let _ = cancel.await;
        })
        .await
    }

    async fn run(
        mut self,
        sink: &dyn NotifySink,
        cancel: impl Future<Output = ()>,
    ) -> Result<ReplayStats> {
        tokio::pin!(cancel);
        info!("Replaying notifications from {}", self.source);

        let mut stats = ReplayStats::default();
        let mut line_number = 0;

        loop {
            let line = tokio::select! {
                () = &mut cancel => {
                    info!("Replay of {} cancelled", self.source);
                    return Ok(stats);
                }
                line = self.lines.next_segment() => line?,
            };
            let Some(line) = line else {
                break;
            };
            line_number += 1;

            let Ok(line) = std::str::from_utf8(&line) else {
                warn!(
                    "Skipping replay line {} from {}: not valid UTF-8",
                    line_number, self.source
                );
                stats.skipped += 1;
                continue;
            };

            if line.trim().is_empty() {
                continue;
            }

            let event = match ReplayEvent::parse(line, line_number) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping replay line from {}: {}", self.source, e);
                    stats.skipped += 1;
                    continue;
                }
            };

            if event.payload.len() > MAX_NOTIFY_SIZE {
                warn!(
                    "Replay line {} carries {} bytes, more than a notification holds",
                    line_number,
                    event.payload.len()
                );
            }

            let wait = event.wait(self.min_delay);
            debug!("Sleeping {:?} before replay line {}", wait, line_number);
            tokio::select! {
                () = &mut cancel => {
                    info!("Replay of {} cancelled", self.source);
                    return Ok(stats);
                }
                () = sleep(wait) => {}
            }

            if let Err(e) = sink.notify(event.payload).await {
                warn!("Replay sink failed at line {}, stopping: {}", line_number, e);
                return Ok(stats);
            }
            stats.sent += 1;
        }

        stats.completed = true;
        info!(
            "Replay of {} finished: {} sent, {} skipped",
            self.source, stats.sent, stats.skipped
        );
        Ok(stats)
    }
}

impl<R> ReplayPlayer<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Play the log on a background task
    pub fn spawn(self, sink: Arc<dyn NotifySink>) -> ReplayHandle {
        let (cancel, cancelled) = oneshot::channel();
        let handle = spawn_logged(async move { self.play_until(sink.as_ref(), cancelled).await });
        ReplayHandle {
            cancel: Some(cancel),
            handle,
        }
    }
}

/// Spawn a replay and log its failure, since the handle may be dropped unjoined
fn spawn_logged<F>(replay: F) -> JoinHandle<Result<ReplayStats>>
where
    F: Future<Output = Result<ReplayStats>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = replay.await;
        if let Err(e) = &result {
            error!("Replay failed: {}", e);
        }
        result
    })
}

/// Handle to a replay running on a background task
pub struct ReplayHandle {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<ReplayStats>>,
}

impl ReplayHandle {
    /// Ask the replay to stop at its next wait
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Whether the replay task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the replay to end
    ///
    /// # Errors
    ///
    /// Returns the playback error, or [`EmulatorError::Transport`] if the
    /// replay task panicked.
    pub async fn join(mut self) -> Result<ReplayStats> {
        let result = (&mut self.handle)
            .await
            .map_err(|e| EmulatorError::Transport(format!("replay task failed: {e}")));
        // Keep the sender alive until the task has finished
        drop(self.cancel.take());
        result?
    }
}

impl Drop for ReplayHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelSink;
    use tokio::time::Instant;

    fn player(log: &'static str) -> ReplayPlayer<&'static [u8]> {
        ReplayPlayer::from_reader(log.as_bytes())
    }

    #[test]
    fn test_parse_event() {
        let event = ReplayEvent::parse("120:AABB01", 1).unwrap();
        assert_eq!(event.delta_millis, 120);
        assert_eq!(&event.payload[..], &[0xAA, 0xBB, 0x01]);
        assert_eq!(event.wait(MIN_REPLAY_DELAY), Duration::from_millis(120));

        let event = ReplayEvent::parse(" 0:ff \r", 2).unwrap();
        assert_eq!(&event.payload[..], &[0xFF]);
        assert_eq!(event.wait(MIN_REPLAY_DELAY), MIN_REPLAY_DELAY);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        for line in [
            "AABB",
            "-5:AABB",
            "+10:AABB",
            ":AABB",
            "1 0:AABB",
            "abc:AABB",
            "10:ABC",
            "10:XYZW",
        ] {
            let err = ReplayEvent::parse(line, 4).unwrap_err();
            assert!(
                matches!(err, EmulatorError::InvalidReplayLine { line: 4, .. }),
                "{line}: {err}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_delay_is_clamped() {
        let (sink, mut receiver) = ChannelSink::new();
        let start = Instant::now();

        let stats = player("10:AABB\n").play(&sink).await.unwrap();

        assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(&[0xAA, 0xBB]));
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(
            stats,
            ReplayStats {
                sent: 1,
                skipped: 0,
                completed: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_are_relative_to_previous_event() {
        let (sink, mut receiver) = ChannelSink::new();
        let log = tokio_test::io::Builder::new()
            .read(b"200:01\n")
            .read(b"1000:02\n")
            .build();
        let start = Instant::now();

        let (stats, ()) = tokio::join!(
            ReplayPlayer::from_reader(BufReader::new(log)).play(&sink),
            async {
                assert_eq!(&receiver.recv().await.unwrap()[..], &[0x01]);
                assert_eq!(start.elapsed(), Duration::from_millis(200));
                assert_eq!(&receiver.recv().await.unwrap()[..], &[0x02]);
                assert_eq!(start.elapsed(), Duration::from_millis(1_200));
            }
        );
        assert_eq!(stats.unwrap().sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_line_is_skipped() {
        let (sink, mut receiver) = ChannelSink::new();

        let stats = player("oops:AABB\n\n75:0102\n").play(&sink).await.unwrap();

        assert_eq!(&receiver.recv().await.unwrap()[..], &[0x01, 0x02]);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.skipped, 1);
        assert!(stats.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_utf8_line_is_skipped() {
        let (sink, mut receiver) = ChannelSink::new();
        let log: &[u8] = b"10:\xFF\xFE\n10:AABB\n";

        let stats = ReplayPlayer::from_reader(log).play(&sink).await.unwrap();

        assert_eq!(&receiver.recv().await.unwrap()[..], &[0xAA, 0xBB]);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.skipped, 1);
        assert!(stats.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_playback() {
        let (sink, mut receiver) = ChannelSink::new();
        let mut handle = player("100:01\n60000:02\n").spawn(Arc::new(sink));

        assert_eq!(&receiver.recv().await.unwrap()[..], &[0x01]);
        handle.cancel();
        let stats = handle.join().await.unwrap();

        assert_eq!(stats.sent, 1);
        assert!(!stats.completed);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_sink_ends_playback() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);

        let stats = player("0:01\n0:02\n").play(&sink).await.unwrap();

        assert_eq!(stats.sent, 0);
        assert!(!stats.completed);
    }

    #[tokio::test]
    async fn test_open_missing_log_is_a_configuration_error() {
        let err = ReplayPlayer::open("/nonexistent/pm5/replaylog.erg")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EmulatorError::ReplayLogUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_spawn_file_reports_missing_log() {
        let (sink, mut receiver) = ChannelSink::new();
        let handle = ReplayPlayer::spawn_file(
            "/nonexistent/pm5/replaylog.erg",
            MIN_REPLAY_DELAY,
            Arc::new(sink),
        );

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, EmulatorError::ReplayLogUnavailable { .. }));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_open_reads_log_file() {
        let path = std::env::temp_dir().join(format!("pm5-replay-{}.erg", std::process::id()));
        tokio::fs::write(&path, "0:0A0B\n").await.unwrap();

        let (sink, mut receiver) = ChannelSink::new();
        let stats = ReplayPlayer::open(&path)
            .await
            .unwrap()
            .with_min_delay(Duration::ZERO)
            .play(&sink)
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(stats.sent, 1);
        assert_eq!(&receiver.recv().await.unwrap()[..], &[0x0A, 0x0B]);
    }
}
