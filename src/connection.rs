// Volley - A buffered, shardable Statsd client for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::flush::FlushEngine;
use crate::transport::{Dialer, SocketStats, TransportStats};
use crate::types::{ErrorKind, MetricError, MetricResult};
use crossbeam_channel::{
    bounded, never, select, tick, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound on how long a queued connection waits for its worker to
/// accept a command and reply to it.
const WORKER_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// How formatted stats reach the flush engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Callers write into the buffer themselves, under a mutex.
    Direct,
    /// Callers push stats into a channel drained by a worker thread. A
    /// bounded queue drops stats when full.
    Queued { capacity: Option<usize> },
}

/// Buffer settings carried into every clone of a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BufferSettings {
    pub(crate) max_packet_size: usize,
    pub(crate) max_stats: Option<usize>,
    pub(crate) flush_interval: Duration,
    pub(crate) delivery: Delivery,
}

impl BufferSettings {
    pub(crate) const DEFAULT_MAX_PACKET_SIZE: usize = 1432;
    pub(crate) const MIN_PACKET_SIZE: usize = 5;
    pub(crate) const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

    pub(crate) fn validate(&self) -> MetricResult<()> {
        if self.max_packet_size < Self::MIN_PACKET_SIZE {
            return Err(MetricError::from((
                ErrorKind::Configuration,
                "max packet size must be at least 5 bytes",
            )));
        }

        if self.max_stats == Some(0) {
            return Err(MetricError::from((
                ErrorKind::Configuration,
                "buffered stat count must be at least 1",
            )));
        }

        if let Delivery::Queued { capacity: Some(0) } = self.delivery {
            return Err(MetricError::from((ErrorKind::Configuration, "queue capacity must be at least 1")));
        }

        Ok(())
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        BufferSettings {
            max_packet_size: Self::DEFAULT_MAX_PACKET_SIZE,
            max_stats: None,
            flush_interval: Self::DEFAULT_FLUSH_INTERVAL,
            delivery: Delivery::Direct,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transmission failures from a send are logged and counted, never returned.
fn swallow_transmission(res: MetricResult<()>) -> MetricResult<()> {
    match res {
        Err(e) if e.kind() == ErrorKind::Transmission => {
            tracing::warn!(error = %e, "failed to flush buffered stats");
            Ok(())
        }
        other => other,
    }
}

/// Background thread flushing a shared engine on a fixed interval.
///
/// Holds only a weak reference to the engine and exits as soon as the
/// shutdown channel is disconnected or the engine is gone.
struct FlushTimer {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FlushTimer {
    fn spawn(interval: Duration, engine: Weak<Mutex<FlushEngine>>) -> MetricResult<FlushTimer> {
        let (tx, rx) = bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("volley-flush-timer".to_owned())
            .spawn(move || run_timer(interval, engine, rx))
            .map_err(|e| MetricError::io(ErrorKind::Configuration, "unable to spawn flush timer", e))?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "started flush timer");
        Ok(FlushTimer {
            shutdown: Some(tx),
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(t) = self.thread.take() {
            let _ = t.join();
            tracing::debug!("stopped flush timer");
        }
    }
}

fn run_timer(interval: Duration, engine: Weak<Mutex<FlushEngine>>, shutdown: Receiver<()>) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {
                let engine = match engine.upgrade() {
                    Some(e) => e,
                    None => break,
                };

                let mut guard = lock(&engine);
                if guard.is_closed() {
                    break;
                }

                if let Err(e) = guard.flush() {
                    tracing::warn!(error = %e, "timed flush failed");
                }
            }
            recv(shutdown) -> _ => break,
        }
    }
}

struct DirectBackend {
    engine: Arc<Mutex<FlushEngine>>,
    timer: Mutex<Option<FlushTimer>>,
    closed: AtomicBool,
}

impl DirectBackend {
    fn new(engine: FlushEngine, interval: Duration) -> MetricResult<Self> {
        let engine = Arc::new(Mutex::new(engine));
        let timer = if interval.is_zero() {
            None
        } else {
            Some(FlushTimer::spawn(interval, Arc::downgrade(&engine))?)
        };

        Ok(DirectBackend {
            engine,
            timer: Mutex::new(timer),
            closed: AtomicBool::new(false),
        })
    }

    fn send_stat(&self, stat: &[u8]) -> MetricResult<()> {
        swallow_transmission(lock(&self.engine).submit(stat))
    }

    fn flush(&self) -> MetricResult<()> {
        lock(&self.engine).flush()
    }

    fn close(&self) -> MetricResult<()> {
        self.closed.store(true, Ordering::Release);

        // The timer must be stopped before taking the engine lock since it
        // may be mid-flush while holding it.
        let timer = lock(&self.timer).take();
        if let Some(mut timer) = timer {
            timer.stop();
        }

        lock(&self.engine).close()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

enum Command {
    Stat(Vec<u8>),
    Flush(Sender<MetricResult<()>>),
    Close(Sender<MetricResult<()>>),
}

struct QueuedBackend {
    sender: Sender<Command>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: SocketStats,
}

impl QueuedBackend {
    fn new(engine: FlushEngine, interval: Duration, capacity: Option<usize>, stats: SocketStats) -> MetricResult<Self> {
        let (tx, rx) = match capacity {
            Some(n) => bounded(n),
            None => unbounded(),
        };

        let worker_stats = stats.clone();
        let worker = thread::Builder::new()
            .name("volley-worker".to_owned())
            .spawn(move || run_worker(engine, interval, rx, worker_stats))
            .map_err(|e| MetricError::io(ErrorKind::Configuration, "unable to spawn queue worker", e))?;

        tracing::debug!(capacity = ?capacity, "started queue worker");
        Ok(QueuedBackend {
            sender: tx,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
            stats,
        })
    }

    fn send_stat(&self, stat: Vec<u8>) -> MetricResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MetricError::closed());
        }

        match self.sender.try_send(Command::Stat(stat)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.incr_stats_dropped();
                tracing::warn!("queue full, dropping stat");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(MetricError::closed()),
        }
    }

    /// Send a command to the worker and wait for its reply. The outer error
    /// means no reply arrived, the inner result is the worker's own.
    fn request(&self, make: fn(Sender<MetricResult<()>>) -> Command) -> MetricResult<MetricResult<()>> {
        let (reply_tx, reply_rx) = bounded(1);
        match self.sender.send_timeout(make(reply_tx), WORKER_REPLY_TIMEOUT) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                return Err(MetricError::from((
                    ErrorKind::Transmission,
                    "timed out queueing command for worker",
                )))
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(MetricError::closed()),
        }

        match reply_rx.recv_timeout(WORKER_REPLY_TIMEOUT) {
            Ok(res) => Ok(res),
            Err(RecvTimeoutError::Timeout) => Err(MetricError::from((
                ErrorKind::Transmission,
                "timed out waiting for worker",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(MetricError::closed()),
        }
    }

    fn flush(&self) -> MetricResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MetricError::closed());
        }
        self.request(Command::Flush)?
    }

    fn close(&self) -> MetricResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let res = match self.request(Command::Close) {
            Ok(res) => {
                if let Some(worker) = lock(&self.worker).take() {
                    let _ = worker.join();
                }
                res
            }
            // Worker already gone
            Err(e) if e.kind() == ErrorKind::Closed => Ok(()),
            // No reply in time: leave the worker detached so close stays bounded
            Err(e) => Err(e),
        };

        tracing::debug!("stopped queue worker");
        res
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Count stats still queued behind a close as dropped and fail any other
/// pending request. A send can pass the closed check just as `close` queues
/// its command, so these stats would otherwise vanish.
fn drain_after_close(commands: &Receiver<Command>, stats: &SocketStats) {
    let mut dropped = 0u64;
    for cmd in commands.try_iter() {
        match cmd {
            Command::Stat(_) => {
                stats.incr_stats_dropped();
                dropped += 1;
            }
            Command::Flush(reply) | Command::Close(reply) => {
                let _ = reply.send(Err(MetricError::closed()));
            }
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "dropping stats queued after close");
    }
}

fn run_worker(mut engine: FlushEngine, interval: Duration, commands: Receiver<Command>, stats: SocketStats) {
    let ticker = if interval.is_zero() { never() } else { tick(interval) };

    loop {
        select! {
            recv(commands) -> cmd => match cmd {
                Ok(Command::Stat(stat)) => {
                    let _ = swallow_transmission(engine.submit(&stat));
                }
                Ok(Command::Flush(reply)) => {
                    let _ = reply.send(engine.flush());
                }
                Ok(Command::Close(reply)) => {
                    let res = engine.close();
                    drain_after_close(&commands, &stats);
                    let _ = reply.send(res);
                    break;
                }
                Err(_) => {
                    if let Err(e) = engine.close() {
                        tracing::warn!(error = %e, "final flush failed");
                    }
                    break;
                }
            },
            recv(ticker) -> _ => {
                if let Err(e) = engine.flush() {
                    tracing::warn!(error = %e, "timed flush failed");
                }
            }
        }
    }
}

enum Backend {
    Direct(DirectBackend),
    Queued(QueuedBackend),
}

/// One buffered connection to a Statsd server: a single buffer and a single
/// socket, plus an optional flush timer or queue worker.
///
/// Connections are never shared between clones. `try_clone` dials the
/// destination again and builds an entirely independent connection with
/// the same settings.
pub(crate) struct Connection {
    dialer: Arc<dyn Dialer>,
    settings: BufferSettings,
    stats: SocketStats,
    backend: Backend,
}

impl Connection {
    pub(crate) fn open(dialer: Arc<dyn Dialer>, settings: BufferSettings) -> MetricResult<Connection> {
        settings.validate()?;

        let transport = dialer.dial()?;
        let stats = SocketStats::default();
        let engine = FlushEngine::new(
            transport,
            settings.max_packet_size,
            settings.max_stats,
            stats.clone(),
        );

        let backend = match settings.delivery {
            Delivery::Direct => Backend::Direct(DirectBackend::new(engine, settings.flush_interval)?),
            Delivery::Queued { capacity } => Backend::Queued(QueuedBackend::new(
                engine,
                settings.flush_interval,
                capacity,
                stats.clone(),
            )?),
        };

        tracing::debug!(
            max_packet_size = settings.max_packet_size,
            max_stats = ?settings.max_stats,
            delivery = ?settings.delivery,
            "opened connection"
        );

        Ok(Connection {
            dialer,
            settings,
            stats,
            backend,
        })
    }

    /// Hand one formatted stat to the flush engine.
    ///
    /// Socket failures are logged and counted but not returned.
    pub(crate) fn send_stat(&self, stat: Vec<u8>) -> MetricResult<()> {
        match &self.backend {
            Backend::Direct(b) => b.send_stat(&stat),
            Backend::Queued(b) => b.send_stat(stat),
        }
    }

    pub(crate) fn flush(&self) -> MetricResult<()> {
        match &self.backend {
            Backend::Direct(b) => b.flush(),
            Backend::Queued(b) => b.flush(),
        }
    }

    /// Stop the timer or worker, flush remaining stats and release the
    /// socket. Closing an already closed connection does nothing.
    pub(crate) fn close(&self) -> MetricResult<()> {
        let res = match &self.backend {
            Backend::Direct(b) => b.close(),
            Backend::Queued(b) => b.close(),
        };
        tracing::debug!(ok = res.is_ok(), "closed connection");
        res
    }

    pub(crate) fn is_closed(&self) -> bool {
        match &self.backend {
            Backend::Direct(b) => b.is_closed(),
            Backend::Queued(b) => b.is_closed(),
        }
    }

    pub(crate) fn try_clone(&self) -> MetricResult<Connection> {
        if self.is_closed() {
            return Err(MetricError::closed());
        }

        tracing::debug!("cloning connection");
        Connection::open(Arc::clone(&self.dialer), self.settings)
    }

    pub(crate) fn stats(&self) -> TransportStats {
        TransportStats::from(&self.stats)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("settings", &self.settings)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close connection on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run_worker, BufferSettings, Command, Connection, Delivery};
    use crate::flush::FlushEngine;
    use crate::test::ErrorDialer;
    use crate::transport::{Dialer, NopDialer, SocketStats, SpyDialer, TransportStats};
    use crate::types::ErrorKind;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn settings(max_stats: Option<usize>, flush_interval: Duration, delivery: Delivery) -> BufferSettings {
        BufferSettings {
            max_packet_size: 1432,
            max_stats,
            flush_interval,
            delivery,
        }
    }

    fn open_spy(settings: BufferSettings) -> (crossbeam_channel::Receiver<Vec<u8>>, Connection) {
        let (rx, dialer) = SpyDialer::new();
        let conn = Connection::open(Arc::new(dialer), settings).unwrap();
        (rx, conn)
    }

    #[test]
    fn test_settings_validation() {
        let mut s = BufferSettings::default();
        assert!(s.validate().is_ok());

        s.max_packet_size = 4;
        assert_eq!(ErrorKind::Configuration, s.validate().unwrap_err().kind());

        s = BufferSettings::default();
        s.max_stats = Some(0);
        assert_eq!(ErrorKind::Configuration, s.validate().unwrap_err().kind());

        s = BufferSettings::default();
        s.delivery = Delivery::Queued { capacity: Some(0) };
        assert_eq!(ErrorKind::Configuration, s.validate().unwrap_err().kind());
    }

    #[test]
    fn test_direct_flush_and_close() {
        let (rx, conn) = open_spy(settings(None, Duration::ZERO, Delivery::Direct));
        conn.send_stat(b"foo:1|c".to_vec()).unwrap();
        conn.send_stat(b"bar:2|c".to_vec()).unwrap();
        assert!(rx.try_recv().is_err());

        conn.flush().unwrap();
        assert_eq!(b"foo:1|c\nbar:2|c".to_vec(), rx.try_recv().unwrap());

        conn.send_stat(b"baz:3|c".to_vec()).unwrap();
        conn.close().unwrap();
        assert_eq!(b"baz:3|c".to_vec(), rx.try_recv().unwrap());

        assert!(conn.close().is_ok());
        assert!(conn.is_closed());
    }

    #[test]
    fn test_direct_closed_operations() {
        let (rx, conn) = open_spy(settings(None, Duration::ZERO, Delivery::Direct));
        conn.close().unwrap();

        assert_eq!(ErrorKind::Closed, conn.send_stat(b"foo:1|c".to_vec()).unwrap_err().kind());
        assert_eq!(ErrorKind::Closed, conn.flush().unwrap_err().kind());
        assert_eq!(ErrorKind::Closed, conn.try_clone().unwrap_err().kind());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_direct_send_swallows_transmission_error() {
        let conn = Connection::open(Arc::new(ErrorDialer), settings(Some(1), Duration::ZERO, Delivery::Direct)).unwrap();
        assert!(conn.send_stat(b"foo:1|c".to_vec()).is_ok());
        assert_eq!(1, conn.stats().packets_dropped);
    }

    #[test]
    fn test_direct_flush_returns_transmission_error() {
        let conn = Connection::open(Arc::new(ErrorDialer), settings(None, Duration::ZERO, Delivery::Direct)).unwrap();
        conn.send_stat(b"foo:1|c".to_vec()).unwrap();
        assert_eq!(ErrorKind::Transmission, conn.flush().unwrap_err().kind());
    }

    #[test]
    fn test_timer_flushes_pending_stats() {
        let (rx, conn) = open_spy(settings(None, Duration::from_millis(20), Delivery::Direct));
        conn.send_stat(b"foo:1|c".to_vec()).unwrap();

        let packet = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(b"foo:1|c".to_vec(), packet);
        conn.close().unwrap();
    }

    #[test]
    fn test_clone_is_independent() {
        let (rx, conn) = open_spy(settings(None, Duration::ZERO, Delivery::Direct));
        let clone = conn.try_clone().unwrap();

        conn.send_stat(b"a:1|c".to_vec()).unwrap();
        clone.send_stat(b"b:1|c".to_vec()).unwrap();
        clone.close().unwrap();

        assert_eq!(b"b:1|c".to_vec(), rx.try_recv().unwrap());
        assert!(!conn.is_closed());
        assert_eq!(0, conn.stats().packets_sent);
        assert_eq!(1, clone.stats().packets_sent);

        conn.flush().unwrap();
        assert_eq!(b"a:1|c".to_vec(), rx.try_recv().unwrap());
    }

    #[test]
    fn test_drop_flushes() {
        let (rx, conn) = open_spy(settings(None, Duration::from_secs(60), Delivery::Direct));
        conn.send_stat(b"foo:1|c".to_vec()).unwrap();
        drop(conn);

        assert_eq!(b"foo:1|c".to_vec(), rx.try_recv().unwrap());
    }

    #[test]
    fn test_queued_flush_and_close() {
        let (rx, conn) = open_spy(settings(None, Duration::ZERO, Delivery::Queued { capacity: None }));
        conn.send_stat(b"foo:1|c".to_vec()).unwrap();
        conn.send_stat(b"bar:2|c".to_vec()).unwrap();
        conn.flush().unwrap();
        assert_eq!(b"foo:1|c\nbar:2|c".to_vec(), rx.try_recv().unwrap());

        conn.send_stat(b"baz:3|c".to_vec()).unwrap();
        conn.close().unwrap();
        assert_eq!(b"baz:3|c".to_vec(), rx.try_recv().unwrap());

        assert!(conn.close().is_ok());
        assert_eq!(ErrorKind::Closed, conn.send_stat(b"x:1|c".to_vec()).unwrap_err().kind());
        assert_eq!(ErrorKind::Closed, conn.flush().unwrap_err().kind());
    }

    #[test]
    fn test_queued_stats_behind_close_are_counted() {
        let (rx, dialer) = SpyDialer::new();
        let stats = SocketStats::default();
        let engine = FlushEngine::new(dialer.dial().unwrap(), 1432, None, stats.clone());

        let (tx, commands) = crossbeam_channel::unbounded();
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let (late_tx, late_rx) = crossbeam_channel::bounded(1);
        tx.send(Command::Stat(b"foo:1|c".to_vec())).unwrap();
        tx.send(Command::Close(reply_tx)).unwrap();
        tx.send(Command::Stat(b"bar:2|c".to_vec())).unwrap();
        tx.send(Command::Stat(b"baz:3|c".to_vec())).unwrap();
        tx.send(Command::Flush(late_tx)).unwrap();

        run_worker(engine, Duration::ZERO, commands, stats.clone());

        assert!(reply_rx.try_recv().unwrap().is_ok());
        assert_eq!(ErrorKind::Closed, late_rx.try_recv().unwrap().unwrap_err().kind());
        assert_eq!(b"foo:1|c".to_vec(), rx.try_recv().unwrap());
        assert!(rx.try_recv().is_err());

        let snapshot = TransportStats::from(&stats);
        assert_eq!(2, snapshot.stats_dropped);
        assert_eq!(1, snapshot.packets_sent);
    }

    #[test]
    fn test_queued_concurrent_senders() {
        let (rx, conn) = open_spy(settings(Some(10), Duration::ZERO, Delivery::Queued { capacity: None }));
        let conn = Arc::new(conn);

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let conn = Arc::clone(&conn);
                thread::spawn(move || {
                    for i in 0..250 {
                        conn.send_stat(format!("foo:{}|c", i).into_bytes()).unwrap();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        conn.close().unwrap();

        let stats: usize = rx.try_iter().map(|p| p.split(|b| *b == b'\n').count()).sum();
        assert_eq!(1000, stats);
    }

    #[test]
    fn test_nop_dialer_connection() {
        assert!(NopDialer.dial().is_ok());
        let conn = Connection::open(Arc::new(NopDialer), BufferSettings::default()).unwrap();
        conn.send_stat(b"foo:1|c".to_vec()).unwrap();
        conn.close().unwrap();
        assert_eq!(1, conn.stats().packets_sent);
    }
}
