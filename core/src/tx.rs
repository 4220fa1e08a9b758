//! Transmit side: renders symbols as fixed-length tone bursts and frames
//! packets for the air. The output of [`ToneModulator::modulate_frame`]
//! fed back through a [`Receiver`](crate::Receiver) yields the original
//! payload, which is also how the integration tests exercise the link.

use crate::framing::make_packet;
use crate::fsk::{bytes_to_symbols, Symbol};
use crate::{FREQS, PREAMBLE_SYMS, SAMPLE_RATE, SYMBOL_FRAMES, SYNC_WORD};
use std::f32::consts::PI;

/// Tone amplitude, leaving headroom before the i16 clamp.
const TONE_AMPLITUDE: f32 = 0.7;

/// Renders 4-FSK symbols as sine bursts of one symbol window each.
pub struct ToneModulator {
    sample_rate: f32,
}

impl ToneModulator {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE as f32,
        }
    }

    /// One symbol window of the tone for `sym`.
    pub fn modulate_symbol(&self, sym: Symbol) -> Vec<f32> {
        debug_assert!(sym < 4);
        let w = 2.0 * PI * FREQS[sym as usize] / self.sample_rate;
        (0..SYMBOL_FRAMES)
            .map(|n| TONE_AMPLITUDE * (w * n as f32).sin())
            .collect()
    }

    /// Concatenated symbol windows for a symbol sequence.
    pub fn modulate(&self, syms: &[Symbol]) -> Vec<f32> {
        let mut samples = Vec::with_capacity(syms.len() * SYMBOL_FRAMES);
        for &sym in syms {
            samples.extend_from_slice(&self.modulate_symbol(sym));
        }
        samples
    }

    /// Render a complete framed packet: preamble, sync word, packet body.
    pub fn modulate_frame(&self, payload: &[u8]) -> Vec<f32> {
        self.modulate(&frame_symbols(payload))
    }
}

impl Default for ToneModulator {
    fn default() -> Self {
        Self::new()
    }
}

/// The alternating 0/2 preamble run, starting at 0.
pub fn preamble_symbols() -> Vec<Symbol> {
    (0..PREAMBLE_SYMS)
        .map(|i| if i % 2 == 0 { 0 } else { 2 })
        .collect()
}

/// Symbol sequence for a whole frame: preamble, sync, packed outer packet.
pub fn frame_symbols(payload: &[u8]) -> Vec<Symbol> {
    let mut syms = preamble_symbols();
    syms.extend_from_slice(&SYNC_WORD);
    syms.extend(bytes_to_symbols(&make_packet(payload)));
    syms
}

/// Convert rendered samples to the wire format: little-endian 16-bit PCM.
pub fn samples_to_pcm(samples: &[f32]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = s.max(-1.0).min(1.0);
        pcm.extend_from_slice(&((clamped * 32767.0) as i16).to_le_bytes());
    }
    pcm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BYTES_PER_SAMPLE, SYMBOL_BYTES};

    #[test]
    fn test_modulate_symbol_length_and_level() {
        let modulator = ToneModulator::new();
        for sym in 0..4u8 {
            let samples = modulator.modulate_symbol(sym);
            assert_eq!(samples.len(), SYMBOL_FRAMES);
            let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!(peak > 0.5 && peak <= TONE_AMPLITUDE + 1e-3);
        }
    }

    #[test]
    fn test_modulate_concatenates_windows() {
        let modulator = ToneModulator::new();
        let samples = modulator.modulate(&[0, 2, 0, 2]);
        assert_eq!(samples.len(), 4 * SYMBOL_FRAMES);
    }

    #[test]
    fn test_preamble_symbols_alternate() {
        assert_eq!(preamble_symbols(), vec![0, 2, 0, 2, 0, 2, 0, 2]);
    }

    #[test]
    fn test_frame_symbols_layout() {
        let syms = frame_symbols(b"hi");
        // preamble + sync + 4 symbols per packet byte (LEN + 2 + CRC16)
        assert_eq!(syms.len(), PREAMBLE_SYMS + 3 + 4 * (1 + 2 + 2));
        assert_eq!(&syms[PREAMBLE_SYMS..PREAMBLE_SYMS + 3], &SYNC_WORD);
        assert!(syms.iter().all(|&s| s < 4));
    }

    #[test]
    fn test_samples_to_pcm_format() {
        let pcm = samples_to_pcm(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(pcm.len(), 4 * BYTES_PER_SAMPLE);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), 32767);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -32767);
        // Out-of-range input clamps instead of wrapping
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), 32767);
    }

    #[test]
    fn test_frame_pcm_window_size() {
        let modulator = ToneModulator::new();
        let pcm = samples_to_pcm(&modulator.modulate_frame(b""));
        assert_eq!(pcm.len() % SYMBOL_BYTES, 0);
        assert_eq!(pcm.len() / SYMBOL_BYTES, PREAMBLE_SYMS + 3 + 4 * 3);
    }
}
