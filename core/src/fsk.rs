//! Symbol-level primitives for the 4-FSK link: 2-bit symbol packing and the
//! per-window narrowband tone detector.
//!
//! A symbol is one of four tones held for a full window of
//! [`SYMBOL_FRAMES`](crate::SYMBOL_FRAMES) samples. Detection is
//! non-coherent: each window is scored against a fixed Goertzel bin per
//! tone and the strongest band wins, so no phase tracking is needed.

use crate::{FREQS, SAMPLE_RATE, SYMBOL_BYTES, SYMBOL_FRAMES};
use std::f32::consts::PI;

/// One 4-FSK symbol: an index 0..=3 into [`FREQS`], carrying two bits.
pub type Symbol = u8;

/// Pack symbols into bytes, four per byte, first symbol in bits 7..6.
/// A trailing group of fewer than four symbols contributes nothing.
pub fn symbols_to_bytes(syms: &[Symbol]) -> Vec<u8> {
    syms.chunks_exact(4)
        .map(|g| (g[0] << 6) | (g[1] << 4) | (g[2] << 2) | g[3])
        .collect()
}

/// Split bytes into symbols, the inverse of [`symbols_to_bytes`].
pub fn bytes_to_symbols(bytes: &[u8]) -> Vec<Symbol> {
    bytes
        .iter()
        .flat_map(|b| [(b >> 6) & 0x03, (b >> 4) & 0x03, (b >> 2) & 0x03, b & 0x03])
        .collect()
}

/// Fixed-bin Goertzel filter for a known window length.
struct Goertzel {
    coeff: f32,
    s1: f32,
    s2: f32,
}

impl Goertzel {
    fn new(freq: f32, window: usize, sample_rate: f32) -> Self {
        let bin = (window as f32 * freq / sample_rate).round();
        let w = 2.0 * PI * bin / window as f32;
        Goertzel {
            coeff: 2.0 * w.cos(),
            s1: 0.0,
            s2: 0.0,
        }
    }

    fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    fn push(&mut self, x: f32) {
        let s0 = x + self.coeff * self.s1 - self.s2;
        self.s2 = self.s1;
        self.s1 = s0;
    }

    fn power(&self) -> f32 {
        self.s1 * self.s1 + self.s2 * self.s2 - self.coeff * self.s1 * self.s2
    }
}

/// Per-window tone detector with one Goertzel band per FSK frequency.
pub struct ToneDetector {
    bands: [Goertzel; 4],
}

impl ToneDetector {
    pub fn new() -> Self {
        Self {
            bands: FREQS.map(|f| Goertzel::new(f, SYMBOL_FRAMES, SAMPLE_RATE as f32)),
        }
    }

    /// Detect the dominant tone in one symbol window of little-endian
    /// 16-bit PCM ([`SYMBOL_BYTES`] bytes). Ties resolve to the lowest band.
    pub fn detect(&mut self, window: &[u8]) -> Symbol {
        debug_assert_eq!(window.len(), SYMBOL_BYTES);
        for band in self.bands.iter_mut() {
            band.reset();
        }
        for frame in window.chunks_exact(2) {
            let v = i16::from_le_bytes([frame[0], frame[1]]) as f32 / 32768.0;
            for band in self.bands.iter_mut() {
                band.push(v);
            }
        }

        let mut best = -1.0f32;
        let mut idx = 0;
        for (i, band) in self.bands.iter().enumerate() {
            let p = band.power();
            if p > best {
                best = p;
                idx = i;
            }
        }
        idx as Symbol
    }
}

impl Default for ToneDetector {
    fn default() -> Self {
        Self::new()
    }
}
