//! Receive side: drives the tone detector over a byte transport and runs
//! the preamble/sync/body framer.
//!
//! The receiver reads one symbol window per iteration from any blocking
//! byte source, detects the dominant tone, and feeds three live streams to
//! the listener: every symbol, the raw stream regrouped into bytes at each
//! 4-symbol boundary, and every payload that survives the outer frame
//! checks. Within one window the order is always symbol, then byte
//! progress, then packet.
//!
//! All malformed traffic (failed sync, length mismatch, bad CRC, body
//! overrun) is dropped silently and the framer returns to hunting; only
//! transport I/O failures surface as errors. A short window is end of
//! stream and terminates the session cleanly.

use crate::error::Result;
use crate::framing::try_parse;
use crate::fsk::{symbols_to_bytes, Symbol, ToneDetector};
use crate::{PREAMBLE_SYMS, SYMBOL_BYTES, SYNC_WORD};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Callbacks invoked from the receiver's thread, in detection order.
/// Every field may be left empty; the receiver keeps framing either way.
#[derive(Default)]
pub struct RxListener {
    /// Every detected symbol, including preamble and sync symbols.
    pub on_symbol: Option<Box<dyn FnMut(Symbol) + Send>>,
    /// The raw symbol stream regrouped into bytes, published whenever the
    /// stream length crosses a 4-symbol boundary.
    pub on_byte_progress: Option<Box<dyn FnMut(&[u8]) + Send>>,
    /// Each payload that passed the length and CRC checks.
    pub on_packet: Option<Box<dyn FnMut(&[u8]) + Send>>,
}

impl RxListener {
    fn symbol(&mut self, sym: Symbol) {
        if let Some(f) = self.on_symbol.as_mut() {
            f(sym);
        }
    }

    fn byte_progress(&mut self, bytes: &[u8]) {
        if let Some(f) = self.on_byte_progress.as_mut() {
            f(bytes);
        }
    }

    fn packet(&mut self, payload: &[u8]) {
        if let Some(f) = self.on_packet.as_mut() {
            f(payload);
        }
    }
}

/// Cloneable handle that asks a running [`Receiver`] to exit. The flag is
/// checked before each blocking window read, so termination latency is at
/// most one symbol window plus the transport's own blocking behavior.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Framer state: hunting counts the alternating-preamble run, collecting
/// buffers body symbols until the LEN-derived count is reached.
enum FramerState {
    Hunt { preamble_run: usize },
    Collecting { body_syms: Vec<Symbol> },
}

/// Running byte view of the session symbol stream: completed bytes plus a
/// tail of up to three pending symbols.
#[derive(Default)]
struct ByteStream {
    bytes: Vec<u8>,
    tail: Vec<Symbol>,
}

impl ByteStream {
    /// Append one symbol; true when it completed a byte.
    fn push(&mut self, sym: Symbol) -> bool {
        self.tail.push(sym);
        if self.tail.len() == 4 {
            let b = (self.tail[0] << 6) | (self.tail[1] << 4) | (self.tail[2] << 2) | self.tail[3];
            self.bytes.push(b);
            self.tail.clear();
            true
        } else {
            false
        }
    }

    fn at_byte_boundary(&self) -> bool {
        self.tail.is_empty()
    }
}

/// One receive session. Owns its detector and framer state, borrows the
/// transport for the session, and drives the listener callbacks from the
/// calling thread.
pub struct Receiver<T> {
    transport: T,
    detector: ToneDetector,
    stop: StopHandle,
}

impl<T: Read> Receiver<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            detector: ToneDetector::new(),
            stop: StopHandle::default(),
        }
    }

    /// Handle for stopping this session from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run the receive loop until the transport ends or a stop is
    /// requested. A truncated window is not an error; only transport I/O
    /// failures surface.
    pub fn run(&mut self, listener: &mut RxListener) -> Result<()> {
        let mut window = vec![0u8; SYMBOL_BYTES];
        let mut stream = ByteStream::default();
        let mut state = FramerState::Hunt { preamble_run: 0 };

        while !self.stop.is_stopped() {
            let Some(sym) = self.next_symbol(&mut window)? else {
                break;
            };
            listener.symbol(sym);
            if stream.push(sym) {
                listener.byte_progress(&stream.bytes);
            }

            state = match state {
                FramerState::Hunt { preamble_run } => {
                    let run = if (preamble_run % 2 == 0 && sym == 0)
                        || (preamble_run % 2 == 1 && sym == 2)
                    {
                        preamble_run + 1
                    } else if sym == 0 {
                        1
                    } else {
                        0
                    };

                    if run >= PREAMBLE_SYMS {
                        match self.expect_sync(&mut window, &mut stream, listener)? {
                            Some(next) => next,
                            // Transport ended inside the sync burst
                            None => break,
                        }
                    } else {
                        FramerState::Hunt { preamble_run: run }
                    }
                }
                FramerState::Collecting { mut body_syms } => {
                    body_syms.push(sym);
                    step_collecting(body_syms, listener)
                }
            };
        }
        Ok(())
    }

    /// Consume the three windows following a completed preamble and compare
    /// them to the sync word. The sync symbols are streamed like any
    /// others; at most one byte boundary can fall at the end of the burst,
    /// so byte progress is checked once after all three.
    fn expect_sync(
        &mut self,
        window: &mut [u8],
        stream: &mut ByteStream,
        listener: &mut RxListener,
    ) -> Result<Option<FramerState>> {
        let mut sync = [0 as Symbol; 3];
        for slot in sync.iter_mut() {
            let Some(sym) = self.next_symbol(window)? else {
                return Ok(None);
            };
            *slot = sym;
            listener.symbol(sym);
            stream.push(sym);
        }
        if stream.at_byte_boundary() {
            listener.byte_progress(&stream.bytes);
        }

        if sync == SYNC_WORD {
            debug!("sync word matched, collecting packet body");
            Ok(Some(FramerState::Collecting {
                body_syms: Vec::new(),
            }))
        } else {
            debug!(?sync, "sync word mismatch, back to hunting");
            Ok(Some(FramerState::Hunt { preamble_run: 0 }))
        }
    }

    /// Read one full symbol window and detect its tone. `None` when the
    /// transport cannot fill a whole window.
    fn next_symbol(&mut self, window: &mut [u8]) -> Result<Option<Symbol>> {
        if !read_window(&mut self.transport, window)? {
            trace!("short window, ending session");
            return Ok(None);
        }
        let sym = self.detector.detect(window);
        trace!(sym, "window detected");
        Ok(Some(sym))
    }
}

/// Advance the collecting state after one appended body symbol. Once four
/// symbols are in, the first packed byte is the LEN field and the body is
/// complete at `(1 + LEN + 2) * 4` symbols. Parse failures drop the body
/// silently.
fn step_collecting(body_syms: Vec<Symbol>, listener: &mut RxListener) -> FramerState {
    if body_syms.len() < 4 {
        return FramerState::Collecting { body_syms };
    }

    let len = ((body_syms[0] << 6) | (body_syms[1] << 4) | (body_syms[2] << 2) | body_syms[3])
        as usize;
    let need_syms = (1 + len + 2) * 4;

    if body_syms.len() == need_syms {
        let pkt = symbols_to_bytes(&body_syms);
        match try_parse(&pkt) {
            Ok(payload) => {
                debug!(len = payload.len(), "packet accepted");
                listener.packet(&payload);
            }
            Err(err) => debug!(%err, "packet rejected"),
        }
        FramerState::Hunt { preamble_run: 0 }
    } else if body_syms.len() > need_syms {
        debug!("body overran expected length, dropping and rehunting");
        FramerState::Hunt { preamble_run: 0 }
    } else {
        FramerState::Collecting { body_syms }
    }
}

/// Fill `buf` completely from the transport. False on a short fill (end of
/// stream); the bytes read so far are discarded with it.
fn read_window<T: Read>(transport: &mut T, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}
