//! Ingestion loop: read, parse, pace, publish
//!
//! Runs on its own thread. Lines are pulled from the [`LineSource`], split
//! into frames by the [`FrameParser`], released on the [`Pacer`] schedule
//! and handed to the [`FanOut`]. The loop ends at end of input, on a stop
//! request, or on a read fault.

use crate::config::PipelineConfig;
use crate::error::DecoderError;
use crate::parser::FrameParser;
use crate::pipeline::fanout::FanOut;
use crate::pipeline::pacer::Pacer;
use crate::pipeline::stats::PipelineCounters;
use crate::pipeline::timing::StopSignal;
use crate::source::LineSource;
use std::sync::Arc;
use std::time::Duration;

/// Why the ingestion loop ended
#[derive(Debug)]
pub enum IngestOutcome {
    /// The source reported end of stream
    EndOfInput,
    /// A stop was requested
    Stopped,
    /// The source failed
    Failed(DecoderError),
}

/// Producer half of the pipeline
pub struct IngestLoop<S> {
    source: S,
    parser: FrameParser,
    fanout: FanOut,
    stop: StopSignal,
    counters: Arc<PipelineCounters>,
    sample_interval: Option<Duration>,
    progress_log_interval: u64,
}

impl<S: LineSource> IngestLoop<S> {
    pub fn new(
        source: S,
        fanout: FanOut,
        stop: StopSignal,
        counters: Arc<PipelineCounters>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            parser: FrameParser::new(config.frame.clone()),
            fanout,
            stop,
            counters,
            sample_interval: config.sample_interval(),
            progress_log_interval: config.progress_log_interval,
        }
    }

    /// Run to completion
    ///
    /// Consumes the loop; dropping the fan-out closes every channel queue,
    /// which lets the workers drain and exit after end of input.
    pub fn run(mut self) -> IngestOutcome {
        tracing::info!(
            "Ingestion started ({} channels, {})",
            self.fanout.channel_count(),
            match self.sample_interval {
                Some(interval) => format!("{:?} per sample", interval),
                None => "unpaced".to_string(),
            }
        );

        let mut pacer = Pacer::new(self.sample_interval);
        let outcome = self.pump(&mut pacer);

        match &outcome {
            IngestOutcome::Failed(e) => tracing::error!("Ingestion failed: {}", e),
            other => tracing::info!(
                "Ingestion finished ({:?}): {} samples in {:.2}s ({:.1} samples/sec)",
                other,
                pacer.released(),
                pacer.elapsed().as_secs_f64(),
                pacer.achieved_rate()
            ),
        }
        outcome
    }

    fn pump(&mut self, pacer: &mut Pacer) -> IngestOutcome {
        loop {
            if self.stop.is_triggered() {
                return IngestOutcome::Stopped;
            }

            let line = match self.source.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return IngestOutcome::EndOfInput,
                Err(e) => {
                    return IngestOutcome::Failed(
                        DecoderError::from(e).with_context("Failed to read from byte source"),
                    )
                }
            };
            self.counters.record_line();

            for sample in self.parser.parse_line(&line) {
                if !pacer.wait_next(&self.stop) {
                    return IngestOutcome::Stopped;
                }
                self.fanout.publish(sample);
                self.log_progress(pacer);
            }
        }
    }

    fn log_progress(&self, pacer: &Pacer) {
        let released = pacer.released();
        if self.progress_log_interval == 0 || released % self.progress_log_interval != 0 {
            return;
        }
        tracing::debug!(
            "Processed {} samples in {}ms (rate: {:.1} samples/sec, lag: {:?})",
            released,
            pacer.elapsed().as_millis(),
            pacer.achieved_rate(),
            pacer.lag()
        );
    }
}
