//! Test data builders for capture lines

use sensorstream_rs::FrameFormat;

/// Builder for one raw capture line
pub struct LineBuilder {
    format: FrameFormat,
    timestamp: Option<u64>,
    parts: Vec<String>,
}

impl LineBuilder {
    pub fn new() -> Self {
        Self::with_format(FrameFormat::default())
    }

    pub fn with_format(format: FrameFormat) -> Self {
        Self {
            format,
            timestamp: Some(1_700_000_000),
            parts: Vec::new(),
        }
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn no_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }

    /// Append a well-formed frame from raw ADC values
    pub fn frame(mut self, sequence: u32, raw: &[u64]) -> Self {
        self.parts.push(self.format.encode_frame(sequence, raw));
        self
    }

    /// Append a frame whose channels all hold the same physical value
    pub fn frame_with_value(self, sequence: u32, value: f64) -> Self {
        let raw = vec![self.format.encode_reading(value); self.format.channel_count];
        self.frame(sequence, &raw)
    }

    /// Append arbitrary bytes
    pub fn garbage(mut self, text: &str) -> Self {
        self.parts.push(text.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut line = self.timestamp.map(|t| t.to_string()).unwrap_or_default();
        for part in self.parts {
            line.push_str(&part);
        }
        line
    }
}

impl Default for LineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `count` single-frame lines with consecutive sequence numbers from 0
pub fn sequential_lines(count: u32, value: f64) -> Vec<String> {
    (0..count)
        .map(|seq| {
            LineBuilder::new()
                .timestamp(1_700_000_000 + seq as u64)
                .frame_with_value(seq, value)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_builder() {
        let line = LineBuilder::new()
            .frame(0x22, &[0x01487A, 0x0245F9, 0x022AC6, 0xE004EB])
            .garbage("zz")
            .build();

        assert_eq!(line, "1700000000!002201487A0245F9022AC6E004EBzz");
    }
}
