//! 4-FSK acoustic modem for short addressed messages
//!
//! Encodes packets as four audible tones (2 bits per symbol) and recovers
//! them from 16-bit PCM with a per-window Goertzel detector and a
//! preamble/sync framer that streams symbols, bytes, and packets live.

pub mod error;
pub mod framing;
pub mod fsk;
pub mod message;
pub mod receiver;
pub mod tx;

pub use error::{ModemError, Result};
pub use fsk::{bytes_to_symbols, symbols_to_bytes, Symbol, ToneDetector};
pub use message::{Message, MessageType, DST_BROADCAST};
pub use receiver::{Receiver, RxListener, StopHandle};
pub use tx::ToneModulator;

// Configuration constants
pub const SAMPLE_RATE: usize = 48_000;
pub const BYTES_PER_SAMPLE: usize = 2;
pub const SYMBOL_MS: usize = 20;

/// Tone frequencies in Hz, one per 2-bit symbol value.
pub const FREQS: [f32; 4] = [1000.0, 1400.0, 1800.0, 2200.0];

/// PCM samples in one symbol window.
pub const SYMBOL_FRAMES: usize = (SAMPLE_RATE * SYMBOL_MS) / 1000; // 960
/// Bytes in one symbol window.
pub const SYMBOL_BYTES: usize = SYMBOL_FRAMES * BYTES_PER_SAMPLE; // 1920

/// Minimum run of alternating 0/2 symbols required before the sync word.
pub const PREAMBLE_SYMS: usize = 8;
/// Three-symbol delimiter between preamble and packet body.
pub const SYNC_WORD: [Symbol; 3] = [1, 3, 0];

/// Hard cap on an outer packet payload (LEN is a single byte).
pub const MAX_PAYLOAD_SIZE: usize = 255;
