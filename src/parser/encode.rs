//! Encoding frames back into wire text
//!
//! The inverse of the parser, used by the capture generator and by tests
//! that need well-formed input.

use crate::config::FrameFormat;
use std::fmt::Write;

impl FrameFormat {
    /// Encode one frame: marker, sequence, then one field per raw reading
    ///
    /// Values wider than their field are truncated to the low digits, which
    /// is how a wrapping sequence counter appears on the wire. Missing
    /// readings are encoded as zero, extra ones are ignored.
    pub fn encode_frame(&self, sequence: u32, raw_readings: &[u64]) -> String {
        let mut out = String::with_capacity(self.frame_len());
        out.push(self.marker);
        push_hex(&mut out, sequence as u64, self.sequence_digits);
        for channel in 0..self.channel_count {
            let raw = raw_readings.get(channel).copied().unwrap_or(0);
            push_hex(&mut out, raw, self.channel_digits);
        }
        out
    }

    /// Convert a physical value back to the nearest raw ADC value
    ///
    /// Values outside `0..=reference_scale` are clamped to the ADC range.
    pub fn encode_reading(&self, value: f64) -> u64 {
        let full_scale = self.full_scale();
        let raw = (value / self.reference_scale * full_scale).round();
        if raw.is_nan() || raw <= 0.0 {
            0
        } else if raw >= full_scale {
            ((1u128 << self.bits) - 1) as u64
        } else {
            raw as u64
        }
    }
}

fn push_hex(out: &mut String, value: u64, digits: usize) {
    let masked = if digits >= 16 {
        value
    } else {
        value & ((1u64 << (digits * 4)) - 1)
    };
    let _ = write!(out, "{:0width$X}", masked, width = digits);
}
