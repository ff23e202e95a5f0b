//! Offloaded filter execution context.
//!
//! CPU-bound adjustment/duotone passes run on a dedicated worker thread.
//! The pixel buffer is moved into the request and moved back in the
//! response; the caller gives up ownership for the duration of the job and
//! must not touch the buffer while a request is outstanding (the blocking
//! [`FilterWorker::run_job`] enforces this by construction).

use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use tracing::debug;

use crate::{
    error::{BitmillError, BitmillResult},
    filters::{DuotoneLut, apply_adjustments, apply_duotone},
    model::FilterConfig,
};

struct FilterRequest {
    id: u64,
    pixels: Vec<u8>,
    config: FilterConfig,
}

enum FilterResponse {
    Complete { id: u64, pixels: Vec<u8> },
    Error { id: u64, message: String },
}

/// Handle to the filter worker thread.
pub struct FilterWorker {
    tx: Option<Sender<FilterRequest>>,
    rx: Receiver<FilterResponse>,
    next_id: u64,
    handle: Option<JoinHandle<()>>,
}

impl FilterWorker {
    /// Start the worker thread. Spawn failure surfaces as
    /// [`BitmillError::Filter`]; callers treat it as non-fatal to the
    /// editing session.
    pub fn spawn() -> BitmillResult<Self> {
        let (req_tx, req_rx) = channel::<FilterRequest>();
        let (res_tx, res_rx) = channel::<FilterResponse>();

        let handle = std::thread::Builder::new()
            .name("bitmill-filter".into())
            .spawn(move || {
                // the gradient cache lives with the worker, keyed by the
                // last color pair it saw
                let mut lut = DuotoneLut::new();
                while let Ok(FilterRequest { id, mut pixels, config }) = req_rx.recv() {
                    if !pixels.len().is_multiple_of(4) {
                        let _ = res_tx.send(FilterResponse::Error {
                            id,
                            message: "pixel buffer length is not a multiple of 4".into(),
                        });
                        continue;
                    }
                    apply_adjustments(&mut pixels, &config);
                    if let Some(duotone) = config.duotone
                        && duotone.enabled
                    {
                        apply_duotone(&mut pixels, duotone.color1, duotone.color2, &mut lut);
                    }
                    if res_tx.send(FilterResponse::Complete { id, pixels }).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| BitmillError::filter(format!("failed to start filter worker: {e}")))?;

        Ok(Self {
            tx: Some(req_tx),
            rx: res_rx,
            next_id: 0,
            handle: Some(handle),
        })
    }

    /// Run one filter job, transferring `pixels` to the worker and blocking
    /// until the processed buffer is transferred back.
    pub fn run_job(&mut self, pixels: Vec<u8>, config: &FilterConfig) -> BitmillResult<Vec<u8>> {
        self.next_id += 1;
        let id = self.next_id;
        debug!(job = id, bytes = pixels.len(), "dispatching filter job");

        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| BitmillError::filter("filter worker is shut down"))?;
        tx.send(FilterRequest {
            id,
            pixels,
            config: config.clone(),
        })
        .map_err(|_| BitmillError::filter("filter worker is no longer running"))?;

        loop {
            match self.rx.recv() {
                Ok(FilterResponse::Complete { id: rid, pixels }) if rid == id => {
                    return Ok(pixels);
                }
                Ok(FilterResponse::Error { id: rid, message }) if rid == id => {
                    return Err(BitmillError::filter(message));
                }
                // responses for superseded ids are dropped
                Ok(_) => continue,
                Err(_) => return Err(BitmillError::filter("filter worker terminated")),
            }
        }
    }
}

impl Drop for FilterWorker {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
