use std::num::NonZeroUsize;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use pbmt_core::{DecodeConstraints, DecodeError, Decoder, NbestList, RichTranslation};
use tracing::{debug, debug_span};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Work / Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub(crate) enum DecodeRequest {
    Best,
    Nbest(usize),
}

pub(crate) struct DecodeWork {
    /// Position in the submitted batch.
    pub index: usize,
    pub sentence_id: usize,
    pub source: Vec<String>,
    pub constraints: DecodeConstraints,
    pub request: DecodeRequest,
    pub reply: mpsc::Sender<DecodeResult>,
}

pub(crate) enum DecodeOutput {
    Best(Option<RichTranslation>),
    Nbest(NbestList),
}

pub(crate) struct DecodeResult {
    pub index: usize,
    pub output: Result<DecodeOutput, DecodeError>,
}

// ---------------------------------------------------------------------------
// Per-thread state
// ---------------------------------------------------------------------------

/// Read-only data every worker starts from.
struct Shared {
    decoder: Decoder,
}

/// State owned by one worker thread. Search state itself is allocated per
/// decode, so this only holds the decoder handle and counters.
struct WorkerState {
    decoder: Decoder,
    decoded: u64,
    failed: u64,
}

fn new_worker_state(shared: &Shared) -> WorkerState {
    WorkerState {
        decoder: shared.decoder.clone(),
        decoded: 0,
        failed: 0,
    }
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Fixed-size pool of decode threads fed from one queue.
pub(crate) struct WorkerPool {
    work_tx: Option<mpsc::Sender<DecodeWork>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers; 0 means one per available core.
    pub fn new(decoder: Decoder, threads: usize) -> Result<Self, EngineError> {
        let size = resolve_threads(threads);
        let shared = Arc::new(Shared { decoder });
        let (work_tx, work_rx) = mpsc::channel::<DecodeWork>();
        let work_rx = Arc::new(Mutex::new(work_rx));

        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let shared = Arc::clone(&shared);
            let rx = Arc::clone(&work_rx);
            let handle = thread::Builder::new()
                .name(format!("pbmt-decode-{i}"))
                .spawn(move || {
                    let state = new_worker_state(&shared);
                    decode_worker(rx, state);
                })
                .map_err(EngineError::Spawn)?;
            handles.push(handle);
        }
        debug!(threads = size, "decode pool started");

        Ok(Self {
            work_tx: Some(work_tx),
            handles,
        })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn submit(&self, work: DecodeWork) -> Result<(), EngineError> {
        let tx = self.work_tx.as_ref().ok_or(EngineError::PoolClosed)?;
        tx.send(work).map_err(|_| EngineError::PoolClosed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop.
        self.work_tx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn resolve_threads(threads: usize) -> usize {
    if threads > 0 {
        return threads;
    }
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Worker threads
// ---------------------------------------------------------------------------

fn decode_worker(rx: Arc<Mutex<mpsc::Receiver<DecodeWork>>>, mut state: WorkerState) {
    loop {
        // Hold the lock only while taking one item.
        let work = {
            let Ok(rx) = rx.lock() else { break };
            match rx.recv() {
                Ok(work) => work,
                Err(_) => break,
            }
        };

        let _span = debug_span!("decode_job", index = work.index, sentence_id = work.sentence_id).entered();
        let output = match work.request {
            DecodeRequest::Best => state
                .decoder
                .translate(&work.source, work.sentence_id, &work.constraints)
                .map(DecodeOutput::Best),
            DecodeRequest::Nbest(n) => state
                .decoder
                .nbest(&work.source, work.sentence_id, &work.constraints, n)
                .map(DecodeOutput::Nbest),
        };
        state.decoded += 1;
        if output.is_err() {
            state.failed += 1;
        }

        // The submitter may have gone away; nothing to report to.
        let _ = work.reply.send(DecodeResult {
            index: work.index,
            output,
        });
    }
    debug!(decoded = state.decoded, failed = state.failed, "decode worker exiting");
}
