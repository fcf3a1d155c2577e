//! Background thread for image decoding.
//!
//! The rendering thread hands out [`DecodeTicket`]s from
//! [`IvImage::start_decode`](crate::image::IvImage::start_decode) and later
//! feeds each [`DecodeOutcome`] back through `complete_decode`, which drops
//! results for evicted images or superseded tokens. The worker only touches
//! files and CPU buffers, never GPU state.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::decoder::ImageDecoder;
use crate::error::{IvError, Result};
use crate::image::{DecodeTicket, DecodedPixels, ImageId, decode_subimage};

/// Finished (or failed, or cancelled) background decode.
#[derive(Debug)]
pub struct DecodeOutcome {
    pub image: ImageId,
    pub token: u64,
    pub result: Result<DecodedPixels>,
}

enum ThreadMessage {
    Decode(DecodeTicket),
    Shutdown,
}

/// Owns the decode thread and its request/result channels.
pub struct DecodeWorker {
    request_tx: Sender<ThreadMessage>,
    result_rx: Receiver<DecodeOutcome>,
    thread_handle: Option<JoinHandle<()>>,
    pending: HashSet<(ImageId, u64)>,
}

impl DecodeWorker {
    /// Spawn the decode thread.
    pub fn spawn(decoder: Arc<dyn ImageDecoder>) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (result_tx, result_rx) = mpsc::channel::<DecodeOutcome>();

        let thread_handle = thread::Builder::new()
            .name("image-decoder".to_string())
            .spawn(move || {
                log::info!("Image decoder thread started ({})", decoder.id());
                Self::thread_loop(decoder.as_ref(), request_rx, result_tx);
                log::info!("Image decoder thread exiting");
            })
            .map_err(|e| IvError::WorkerUnavailable(format!("failed to spawn: {}", e)))?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            pending: HashSet::new(),
        })
    }

    fn thread_loop(
        decoder: &dyn ImageDecoder,
        request_rx: Receiver<ThreadMessage>,
        result_tx: Sender<DecodeOutcome>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(ThreadMessage::Decode(ticket)) => {
                    let outcome = Self::decode(decoder, ticket);
                    if result_tx.send(outcome).is_err() {
                        log::warn!("Result channel closed, decoder thread exiting");
                        break;
                    }
                }
                Ok(ThreadMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    log::debug!("Request channel closed, decoder thread exiting");
                    break;
                }
            }
        }
    }

    fn decode(decoder: &dyn ImageDecoder, ticket: DecodeTicket) -> DecodeOutcome {
        let result = if ticket.cancel.load(Ordering::Relaxed) {
            Err(IvError::Cancelled)
        } else {
            let started = Instant::now();
            let cancel = Arc::clone(&ticket.cancel);
            let mut keep_going = |_: f32| !cancel.load(Ordering::Relaxed);
            let result = decode_subimage(decoder, &ticket.path, ticket.subimage, &mut keep_going);
            log::debug!(
                "Decoded {:?} subimage {} for {} in {:.1?}: {}",
                ticket.path,
                ticket.subimage,
                ticket.image,
                started.elapsed(),
                if result.is_ok() { "ok" } else { "failed" }
            );
            result
        };
        DecodeOutcome {
            image: ticket.image,
            token: ticket.token,
            result,
        }
    }

    /// Queue a decode.
    pub fn request(&mut self, ticket: DecodeTicket) -> Result<()> {
        let key = (ticket.image, ticket.token);
        self.request_tx
            .send(ThreadMessage::Decode(ticket))
            .map_err(|_| IvError::WorkerUnavailable("request channel closed".into()))?;
        self.pending.insert(key);
        log::debug!("Sent decode request {} for {}", key.1, key.0);
        Ok(())
    }

    /// Oldest finished decode, without blocking.
    pub fn take_one_result(&mut self) -> Option<DecodeOutcome> {
        match self.result_rx.try_recv() {
            Ok(outcome) => Some(self.finish(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Decoder thread disconnected");
                self.pending.clear();
                None
            }
        }
    }

    /// Wait up to `timeout` for a finished decode.
    pub fn wait_one_result(&mut self, timeout: Duration) -> Option<DecodeOutcome> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(self.finish(outcome)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Decoder thread disconnected");
                self.pending.clear();
                None
            }
        }
    }

    fn finish(&mut self, outcome: DecodeOutcome) -> DecodeOutcome {
        self.pending.remove(&(outcome.image, outcome.token));
        outcome
    }

    /// Requests sent but not yet taken back.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        log::debug!("Shutting down image decoder thread");
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("Decoder thread panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mock::MemoryDecoder;
    use crate::image::IvImage;
    use crate::spec::{ImageSpec, SampleFormat};

    const WAIT: Duration = Duration::from_secs(5);

    fn worker_with(paths: &[&str]) -> (DecodeWorker, Arc<MemoryDecoder>) {
        let decoder = Arc::new(MemoryDecoder::new());
        for path in paths {
            decoder.insert(
                *path,
                vec![(ImageSpec::new(2, 2, 1, SampleFormat::U8), vec![1, 2, 3, 4])],
            );
        }
        let worker = DecodeWorker::spawn(decoder.clone()).unwrap();
        (worker, decoder)
    }

    #[test]
    fn test_background_decode_installs_pixels() {
        let (mut worker, decoder) = worker_with(&["a.png"]);
        let mut img = IvImage::new("a.png");

        worker.request(img.start_decode(0).unwrap()).unwrap();
        assert_eq!(worker.pending_count(), 1);

        let outcome = worker.wait_one_result(WAIT).unwrap();
        assert_eq!(outcome.image, img.id());
        img.complete_decode(outcome.token, outcome.result).unwrap();
        assert_eq!(img.pixels(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(worker.pending_count(), 0);
        assert_eq!(decoder.read_calls(), 1);
    }

    #[test]
    fn test_cancelled_request_is_discarded() {
        let (mut worker, decoder) = worker_with(&["a.png"]);
        let mut img = IvImage::new("a.png");

        let ticket = img.start_decode(0).unwrap();
        let token = ticket.token;
        img.cancel_decode();
        worker.request(ticket).unwrap();

        let outcome = worker.wait_one_result(WAIT).unwrap();
        assert!(matches!(outcome.result, Err(IvError::Cancelled)));
        assert!(img.complete_decode(token, outcome.result).is_err());
        assert!(!img.pixels_valid());
        assert!(!img.has_error());
        assert_eq!(decoder.read_calls(), 0);
    }

    #[test]
    fn test_failures_come_back_as_results() {
        let (mut worker, _) = worker_with(&[]);
        let mut img = IvImage::new("missing.png");
        worker.request(img.start_decode(0).unwrap()).unwrap();

        let outcome = worker.wait_one_result(WAIT).unwrap();
        let err = img.complete_decode(outcome.token, outcome.result).unwrap_err();
        assert!(matches!(err, IvError::FileNotFound { .. }));
        assert!(img.bad_file());
    }

    #[test]
    fn test_take_one_result_does_not_block() {
        let (mut worker, _) = worker_with(&[]);
        assert!(worker.take_one_result().is_none());
        assert!(worker.wait_one_result(Duration::from_millis(10)).is_none());
    }
}
