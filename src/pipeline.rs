//! Decode → ingest pipeline with a dedicated worker thread
//!
//! Wires the packet decoder and stream processor into the single
//! producer / single consumer shape the components are designed for:
//! the caller's transport context pushes payloads, samples cross a bounded
//! channel in arrival order, and one worker thread owns ingestion. A
//! presentation context queries through a [`StreamView`] handle that locks
//! the processor for a consistent snapshot across all ring buffers.
//!
//! Backpressure on the sample queue blocks the producer instead of
//! dropping, so the loss statistics only ever reflect what the radio link
//! actually lost. The frame tap is the one place that may drop: if the
//! presentation consumer lags, it misses frames, but the processor has
//! already ingested them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};

use crate::config::PipelineConfig;
use crate::protocol::decoder::{DecodeError, LinkStats, PacketDecoder};
use crate::protocol::packet::{DecodedPacket, Sample};
use crate::stream::processor::{
    ProcessedFrame, ProcessorStats, StreamProcessor, StreamSnapshot,
};

/// Cloneable query handle for the presentation context
///
/// Every method takes the processor lock once, so multi-buffer reads come
/// from a single logical append count and never tear. All queries are
/// harmless when the worker has died (empty/zero results).
#[derive(Clone)]
pub struct StreamView {
    processor: Arc<Mutex<StreamProcessor>>,
    link: Arc<Mutex<LinkStats>>,
}

impl StreamView {
    /// Buffered values for a channel by query name
    ///
    /// Empty for unknown channel names so polling stays robust against
    /// typos and version skew.
    pub fn buffer(&self, channel: &str, count: Option<usize>) -> Vec<f64> {
        if let Ok(processor) = self.processor.lock() {
            processor.buffer(channel, count)
        } else {
            Vec::new()
        }
    }

    /// Consistent multi-channel snapshot
    pub fn snapshot(&self, count: Option<usize>) -> Option<StreamSnapshot> {
        self.processor
            .lock()
            .ok()
            .map(|processor| processor.snapshot(count))
    }

    /// Estimated sampling rate in Hz
    pub fn sampling_rate(&self) -> f64 {
        if let Ok(processor) = self.processor.lock() {
            processor.estimate_sampling_rate()
        } else {
            0.0
        }
    }

    /// Processor configuration and occupancy snapshot
    pub fn stream_stats(&self) -> Option<ProcessorStats> {
        self.processor.lock().ok().map(|processor| processor.stats())
    }

    /// Link reception statistics as of the last decoded packet
    pub fn statistics(&self) -> LinkStats {
        self.link
            .lock()
            .map(|stats| *stats)
            .unwrap_or_default()
    }
}

/// Telemetry pipeline: decoder on the producer side, processor on a worker
///
/// # Example
/// ```
/// use emgstream::config::PipelineConfig;
/// use emgstream::pipeline::TelemetryPipeline;
///
/// let mut pipeline = TelemetryPipeline::start(PipelineConfig::default()).unwrap();
///
/// // Sequence 0, one all-zero sample record
/// pipeline.push_packet(&[0u8; 16]).unwrap();
///
/// let frame = pipeline.frames().recv().unwrap();
/// assert_eq!(frame.raw.emg, 0);
///
/// pipeline.shutdown().unwrap();
/// ```
pub struct TelemetryPipeline {
    decoder: PacketDecoder,
    processor: Arc<Mutex<StreamProcessor>>,
    /// Published copy of the decoder statistics for concurrent readers
    link: Arc<Mutex<LinkStats>>,
    /// Dropping this closes the channel and stops the worker
    sample_tx: Option<Sender<Sample>>,
    frame_rx: Receiver<ProcessedFrame>,
    worker: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl TelemetryPipeline {
    /// Start the pipeline and its ingest worker
    pub fn start(config: PipelineConfig) -> Result<Self> {
        let processor = Arc::new(Mutex::new(StreamProcessor::from_config(&config.processor)));
        let link = Arc::new(Mutex::new(LinkStats::default()));
        let (sample_tx, sample_rx) = crossbeam_channel::bounded::<Sample>(config.queue_depth);
        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<ProcessedFrame>(config.frame_tap_depth);
        let running = Arc::new(AtomicBool::new(true));

        let worker_processor = Arc::clone(&processor);
        let worker_running = Arc::clone(&running);
        let worker = std::thread::Builder::new()
            .name("emgstream-ingest".into())
            .spawn(move || {
                for sample in sample_rx {
                    let frame = match worker_processor.lock() {
                        Ok(mut processor) => processor.ingest(sample),
                        Err(_) => break,
                    };
                    if frame_tx.try_send(frame).is_err() {
                        tracing::trace!("frame tap full, presentation is lagging");
                    }
                }
                worker_running.store(false, Ordering::Release);
                tracing::debug!("ingest worker stopped");
            })?;

        tracing::info!(
            queue_depth = config.queue_depth,
            frame_tap_depth = config.frame_tap_depth,
            "pipeline started"
        );

        Ok(Self {
            decoder: PacketDecoder::new(),
            processor,
            link,
            sample_tx: Some(sample_tx),
            frame_rx,
            worker: Some(worker),
            running,
        })
    }

    /// Decode one notification payload and hand its samples to the worker
    ///
    /// Blocks when the sample queue is full. Malformed payloads are
    /// reported to the caller and skipped; the stream continues with the
    /// next packet.
    pub fn push_packet(&mut self, payload: &[u8]) -> Result<DecodedPacket, DecodeError> {
        let packet = self.decoder.decode(payload)?;
        self.publish_link_stats();

        if let Some(tx) = &self.sample_tx {
            for sample in &packet.samples {
                if tx.send(*sample).is_err() {
                    tracing::error!("ingest worker is gone, samples dropped");
                    break;
                }
            }
        }

        Ok(packet)
    }

    fn publish_link_stats(&self) {
        if let Ok(mut link) = self.link.lock() {
            *link = self.decoder.statistics();
        }
    }

    /// Receiver for processed frames, one per ingested sample
    ///
    /// Frames arrive in ingestion order. A lagging consumer misses frames
    /// (the tap is bounded) but never stalls ingestion.
    pub fn frames(&self) -> &Receiver<ProcessedFrame> {
        &self.frame_rx
    }

    /// Create a query handle for a presentation context
    pub fn view(&self) -> StreamView {
        StreamView {
            processor: Arc::clone(&self.processor),
            link: Arc::clone(&self.link),
        }
    }

    /// Link reception statistics from the decoder
    pub fn statistics(&self) -> LinkStats {
        self.decoder.statistics()
    }

    /// Access the decoder, e.g. for gap-event history
    pub fn decoder(&self) -> &PacketDecoder {
        &self.decoder
    }

    /// Buffered values for a channel by query name
    pub fn buffer(&self, channel: &str, count: Option<usize>) -> Vec<f64> {
        self.view().buffer(channel, count)
    }

    /// Estimated sampling rate in Hz
    pub fn sampling_rate(&self) -> f64 {
        self.view().sampling_rate()
    }

    /// Processor configuration and occupancy snapshot
    pub fn stream_stats(&self) -> Option<ProcessorStats> {
        self.view().stream_stats()
    }

    /// Clear stream history and filter state, keep link statistics
    pub fn reset_stream(&self) {
        if let Ok(mut processor) = self.processor.lock() {
            processor.reset();
        }
    }

    /// Full reset for a reconnect: link statistics and stream state
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.publish_link_stats();
        self.reset_stream();
        tracing::info!("pipeline reset");
    }

    /// True while the ingest worker is alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it to drain the queue
    pub fn shutdown(mut self) -> Result<()> {
        self.sample_tx.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("ingest worker panicked"))?;
        }
        tracing::info!("pipeline shut down");
        Ok(())
    }
}
