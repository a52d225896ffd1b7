//! Line transport for the simulated box.
//!
//! Every request is one line holding a hex-encoded frame; every response is
//! one hex-encoded line. Between requests the update pass runs on a fixed
//! tick. Everything runs on a single task, so a frame and an update pass
//! never overlap. A request line longer than the hex form of the largest
//! frame is answered with an error and the rest of it is discarded.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use cbox_box::{Controlbox, LoadReport};
use cbox_protocol::{Response, MAX_FRAME_SIZE};
use cbox_types::{CboxError, Ticks};

use crate::config::SimConfig;

/// Longest request line accepted: a hex-encoded frame plus `\r\n`.
const MAX_LINE: usize = 2 * MAX_FRAME_SIZE + 2;

enum Line {
    Request(String),
    TooLong,
    Eof,
}

/// Splits a byte stream into request lines of at most [`MAX_LINE`] bytes.
///
/// Cancel safe: a partly read line stays buffered for the next call.
struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Dropping bytes up to the end of an overlong line.
    discarding: bool,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            discarding: false,
        }
    }

    async fn next_line(&mut self) -> io::Result<Line> {
        loop {
            let room = MAX_LINE.saturating_sub(self.buf.len()) as u64;
            let n = (&mut self.inner)
                .take(room)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 && self.buf.is_empty() {
                return Ok(Line::Eof);
            }
            let ended = self.buf.last() == Some(&b'\n');

            if self.discarding {
                self.buf.clear();
                self.discarding = !ended;
                continue;
            }
            if !ended && self.buf.len() >= MAX_LINE {
                self.buf.clear();
                self.discarding = true;
                return Ok(Line::TooLong);
            }
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            return Ok(Line::Request(line));
        }
    }
}

/// A booted box plus its clock.
pub struct Simulator {
    cbox: Controlbox,
    started: Instant,
    tick: Duration,
}

impl Simulator {
    pub fn new(config: SimConfig) -> anyhow::Result<(Self, LoadReport)> {
        let tick = Duration::from_millis(config.tick_ms);
        let (cbox, report) = Controlbox::open(config.cbox)?;
        let sim = Self {
            cbox,
            started: Instant::now(),
            tick,
        };
        Ok((sim, report))
    }

    /// Milliseconds since the simulator started.
    pub fn now(&self) -> Ticks {
        Ticks::try_from(self.started.elapsed().as_millis()).unwrap_or(Ticks::MAX)
    }

    pub fn controlbox(&self) -> &Controlbox {
        &self.cbox
    }

    /// Answer one request line. Returns `None` for a blank line.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let now = self.now();
        let reply = match hex::decode(line) {
            Ok(frame) => self.cbox.handle_frame(&frame, now),
            Err(e) => {
                debug!(error = %e, "request line is not hex");
                Response::error(CboxError::InputStreamDecodingError, None).encode()
            }
        };
        Some(hex::encode(reply))
    }

    fn tick(&mut self) {
        let now = self.now();
        self.cbox.update(now);
    }

    fn interval(&self) -> Interval {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    /// Serve one host until it closes its side.
    pub async fn serve_stream<R, W>(
        &mut self,
        reader: R,
        mut writer: W,
        interval: &mut Interval,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = LineReader::new(reader);
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let reply = match line? {
                        Line::Eof => return Ok(()),
                        Line::Request(line) => self.handle_line(&line),
                        Line::TooLong => {
                            warn!(max = MAX_LINE, "request line too long; discarding it");
                            let reply = Response::error(CboxError::InputStreamReadError, None);
                            Some(hex::encode(reply.encode()))
                        }
                    };
                    if let Some(reply) = reply {
                        writer.write_all(reply.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                }
                _ = interval.tick() => self.tick(),
            }
        }
    }

    /// Accept hosts one at a time until interrupted.
    pub async fn serve_tcp(&mut self, listener: TcpListener) -> io::Result<()> {
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for ctrl-c");
            }
        };
        self.serve_tcp_until(listener, interrupted).await
    }

    /// Accept hosts one at a time until `shutdown` completes, even while a
    /// host is connected.
    pub async fn serve_tcp_until<F>(&mut self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");
        let connectivity = self.cbox.connectivity();
        let mut interval = self.interval();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    info!(peer = %peer, "host connected");
                    connectivity.set_connected(Some(local.ip()));
                    let (read, write) = stream.into_split();
                    let served = tokio::select! {
                        served = self.serve_stream(BufReader::new(read), write, &mut interval) => Some(served),
                        () = &mut shutdown => None,
                    };
                    connectivity.set_disconnected();
                    info!(peer = %peer, "host disconnected");
                    match served {
                        Some(Ok(())) => {}
                        Some(Err(e)) => warn!(peer = %peer, error = %e, "connection dropped"),
                        None => {
                            info!("interrupted");
                            return Ok(());
                        }
                    }
                }
                _ = interval.tick() => self.tick(),
                () = &mut shutdown => {
                    info!("interrupted");
                    return Ok(());
                }
            }
        }
    }

    /// Serve a single host on stdin/stdout.
    pub async fn serve_stdio(&mut self) -> io::Result<()> {
        let mut interval = self.interval();
        self.cbox.connectivity().set_connected(None);
        let result = self
            .serve_stream(
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                &mut interval,
            )
            .await;
        self.cbox.connectivity().set_disconnected();
        result
    }
}

/// Boot the box described by `config` and serve it.
pub async fn run(config: SimConfig, stdio: bool) -> anyhow::Result<()> {
    let bind: SocketAddr = config.bind;
    let (mut sim, report) = Simulator::new(config)?;
    info!(
        restored = report.restored.len(),
        tombstoned = report.tombstoned.len(),
        "simulator ready"
    );
    if stdio {
        sim.serve_stdio().await?;
    } else {
        let listener = TcpListener::bind(bind).await?;
        sim.serve_tcp(listener).await?;
    }
    let storage = sim.cbox.shutdown();
    debug!(used_bytes = storage.used_bytes(), "storage released");
    Ok(())
}
