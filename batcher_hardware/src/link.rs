//! TCP link to the plant controller.
//!
//! A background thread owns the connection: it reads inbound JSON lines,
//! publishes weight frames over a bounded channel, and reconnects on a fixed
//! backoff whenever the peer goes away. Outbound commands are written from
//! the caller's thread through a cloned socket.
//!
//! Each `ControllerLink` owns exactly one thread, shut down and joined on drop.
use crate::error::HwError;
use crate::wire::{self, Inbound, Outbound};
use batcher_traits::clock::Clock;
use batcher_traits::{BoxError, RelayLink, WeightFeed, Weights};
use crossbeam_channel as xch;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const READ_POLL: Duration = Duration::from_millis(200);
const BACKOFF_SLICE: Duration = Duration::from_millis(50);
const FRAME_BUFFER: usize = 8;

#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub addr: String,
    pub reconnect: Duration,
    pub connect_timeout: Duration,
}

impl LinkOptions {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            reconnect: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

struct Shared {
    connected: AtomicBool,
    shutdown: AtomicBool,
    writer: Mutex<Option<TcpStream>>,
}

impl Shared {
    fn mark_lost(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::warn!("controller link lost");
        }
        if let Ok(mut w) = self.writer.lock() {
            if let Some(s) = w.take() {
                let _ = s.shutdown(Shutdown::Both);
            }
        }
    }

    fn send(&self, msg: &Outbound) -> Result<(), HwError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(HwError::Disconnected);
        }
        let line = wire::encode(msg)?;
        let res = {
            let mut guard = self
                .writer
                .lock()
                .map_err(|_| HwError::Controller("writer lock poisoned".into()))?;
            match guard.as_mut() {
                Some(stream) => stream.write_all(line.as_bytes()).map_err(HwError::from),
                None => Err(HwError::Disconnected),
            }
        };
        if res.is_err() {
            self.mark_lost();
        }
        res
    }
}

pub struct ControllerLink {
    shared: Arc<Shared>,
    frames: xch::Receiver<Weights>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl ControllerLink {
    /// Start the connection thread. Returns immediately; the link reports
    /// `is_connected() == false` until the first connect succeeds.
    pub fn spawn<C: Clock + Send + 'static>(opts: LinkOptions, clock: C) -> Self {
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            writer: Mutex::new(None),
        });
        let (tx, rx) = xch::bounded(FRAME_BUFFER);
        let drain = rx.clone();
        let thread_shared = shared.clone();

        let join_handle = std::thread::spawn(move || {
            let shared = thread_shared;
            while !shared.shutdown.load(Ordering::Relaxed) {
                match connect(&opts) {
                    Ok(stream) => {
                        tracing::info!(addr = %opts.addr, "controller connected");
                        serve(&shared, stream, &tx, &drain);
                        shared.mark_lost();
                    }
                    Err(e) => {
                        tracing::debug!(addr = %opts.addr, error = %e, "controller connect failed");
                    }
                }
                // Fixed backoff, sliced so shutdown stays responsive
                let epoch = clock.now();
                while !shared.shutdown.load(Ordering::Relaxed)
                    && u128::from(clock.ms_since(epoch)) < opts.reconnect.as_millis()
                {
                    clock.sleep(BACKOFF_SLICE);
                }
            }
            tracing::trace!("controller link thread exiting cleanly");
        });

        Self {
            shared,
            frames: rx,
            join_handle: Some(join_handle),
        }
    }

    /// Handle for issuing relay commands.
    pub fn relays(&self) -> LinkRelays {
        LinkRelays {
            shared: self.shared.clone(),
        }
    }

    /// Handle for consuming weight frames.
    pub fn feed(&self) -> LinkFeed {
        LinkFeed {
            shared: self.shared.clone(),
            frames: self.frames.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn request_status(&self) -> Result<(), HwError> {
        self.shared.send(&Outbound::GetStatus)
    }
}

impl Drop for ControllerLink {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.mark_lost();
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::error!("controller link thread panicked: {:?}", e);
            }
        }
    }
}

fn connect(opts: &LinkOptions) -> Result<TcpStream, HwError> {
    let mut last = HwError::Disconnected;
    for addr in opts.addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, opts.connect_timeout) {
            Ok(s) => {
                s.set_read_timeout(Some(READ_POLL))?;
                s.set_nodelay(true)?;
                return Ok(s);
            }
            Err(e) => last = HwError::Io(e),
        }
    }
    Err(last)
}

fn serve(
    shared: &Shared,
    stream: TcpStream,
    tx: &xch::Sender<Weights>,
    drain: &xch::Receiver<Weights>,
) {
    match stream.try_clone() {
        Ok(w) => {
            if let Ok(mut guard) = shared.writer.lock() {
                *guard = Some(w);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot clone controller socket");
            return;
        }
    }
    shared.connected.store(true, Ordering::SeqCst);

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    while !shared.shutdown.load(Ordering::Relaxed) {
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with('\n') {
                    handle_line(&line, tx, drain);
                    line.clear();
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                tracing::warn!(error = %e, "controller read failed");
                break;
            }
        }
    }
}

fn handle_line(line: &str, tx: &xch::Sender<Weights>, drain: &xch::Receiver<Weights>) {
    if line.trim().is_empty() {
        return;
    }
    match wire::decode(line) {
        Ok(Inbound::WeightUpdate { weights, .. }) => {
            let w = Weights::from(weights);
            // Keep the newest frames; a slow consumer loses the oldest.
            if let Err(xch::TrySendError::Full(w)) = tx.try_send(w) {
                let _ = drain.try_recv();
                let _ = tx.try_send(w);
            }
        }
        Ok(Inbound::RelayAck {
            relay,
            state,
            success,
        }) => {
            if success {
                tracing::trace!(%relay, state, "relay ack");
            } else {
                tracing::warn!(%relay, state, "controller failed to switch relay");
            }
        }
        Ok(Inbound::Status { relays }) => tracing::debug!(count = relays.len(), "controller status"),
        Ok(Inbound::EmergencyAck { message }) => tracing::info!(%message, "emergency stop acknowledged"),
        Ok(Inbound::Error { message }) => tracing::warn!(%message, "controller error"),
        Ok(Inbound::Other) => {}
        Err(e) => tracing::debug!(error = %e, "ignoring malformed controller line"),
    }
}

/// Relay command side of a [`ControllerLink`].
#[derive(Clone)]
pub struct LinkRelays {
    shared: Arc<Shared>,
}

impl RelayLink for LinkRelays {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn set_relay(&mut self, relay: &str, on: bool, address: Option<u16>) -> Result<(), BoxError> {
        self.shared
            .send(&Outbound::RelayControl {
                relay: relay.to_string(),
                state: on,
                gpio_pin: address,
            })
            .map_err(Into::into)
    }

    fn emergency_stop(&mut self) -> Result<(), BoxError> {
        self.shared.send(&Outbound::EmergencyStop).map_err(Into::into)
    }
}

/// Weight frame side of a [`ControllerLink`].
pub struct LinkFeed {
    shared: Arc<Shared>,
    frames: xch::Receiver<Weights>,
}

impl WeightFeed for LinkFeed {
    fn is_live(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn latest(&mut self) -> Result<Option<Weights>, BoxError> {
        if !self.is_live() {
            return Err(HwError::Disconnected.into());
        }
        Ok(self.frames.try_iter().last())
    }
}
