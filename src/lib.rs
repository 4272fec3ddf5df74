//! Multi-threaded phrase-based decoding.
//!
//! [`Engine`] wraps a [`Decoder`] built from shared models and a fixed pool
//! of decode threads. Single sentences decode on the calling thread; batches
//! are spread over the pool and returned in input order.

pub mod trace_init;
mod worker_pool;

use std::sync::{mpsc, Arc};

use pbmt_core::features::{Featurizer, Scorer};
use pbmt_core::rules::RuleSource;
use pbmt_core::settings::{Settings, SettingsError};
use tracing::{debug, debug_span, warn};

pub use pbmt_core::{
    DecodeConstraints, DecodeError, Decoder, DecoderConfig, NbestList, RichTranslation,
};

use worker_pool::{DecodeOutput, DecodeRequest, DecodeResult, DecodeWork, WorkerPool};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to spawn decode worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("decode pool is shut down")]
    PoolClosed,
    #[error("decode worker exited before reporting sentence {index}")]
    WorkerLost { index: usize },
}

/// One sentence of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSentence {
    pub sentence_id: usize,
    pub source: Vec<String>,
    pub constraints: DecodeConstraints,
}

impl BatchSentence {
    pub fn new(sentence_id: usize, source: Vec<String>) -> Self {
        Self {
            sentence_id,
            source,
            constraints: DecodeConstraints::none(),
        }
    }

    pub fn with_constraints(mut self, constraints: DecodeConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Shared decoder plus a worker pool for batch decoding.
pub struct Engine {
    decoder: Decoder,
    pool: WorkerPool,
}

impl Engine {
    /// `threads == 0` sizes the pool to the available parallelism.
    pub fn new(decoder: Decoder, threads: usize) -> Result<Self, EngineError> {
        let pool = WorkerPool::new(decoder.clone(), threads)?;
        Ok(Self { decoder, pool })
    }

    /// Builds the decoder from parsed settings, including the pool size.
    pub fn from_settings(
        rules: Arc<dyn RuleSource>,
        featurizer: Arc<dyn Featurizer>,
        scorer: Arc<dyn Scorer>,
        settings: &Settings,
    ) -> Result<Self, EngineError> {
        let config = settings.decoder_config()?;
        let decoder = Decoder::new(rules, featurizer, scorer, config)?;
        Self::new(decoder, settings.engine.threads)
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn threads(&self) -> usize {
        self.pool.size()
    }

    pub fn translate(
        &self,
        source: &[String],
        sentence_id: usize,
        constraints: &DecodeConstraints,
    ) -> Result<Option<RichTranslation>, EngineError> {
        Ok(self.decoder.translate(source, sentence_id, constraints)?)
    }

    pub fn nbest(
        &self,
        source: &[String],
        sentence_id: usize,
        constraints: &DecodeConstraints,
        n: usize,
    ) -> Result<NbestList, EngineError> {
        Ok(self.decoder.nbest(source, sentence_id, constraints, n)?)
    }

    /// Best translation of every sentence, in input order. A failing
    /// sentence yields an error in its own slot only.
    pub fn translate_batch(
        &self,
        sentences: Vec<BatchSentence>,
    ) -> Vec<Result<Option<RichTranslation>, EngineError>> {
        self.run_batch(sentences, DecodeRequest::Best)
            .into_iter()
            .map(|result| match result? {
                DecodeOutput::Best(best) => Ok(best),
                DecodeOutput::Nbest(list) => Ok(list.translations.into_iter().next()),
            })
            .collect()
    }

    /// Up to `n` translations of every sentence, in input order.
    pub fn nbest_batch(
        &self,
        sentences: Vec<BatchSentence>,
        n: usize,
    ) -> Vec<Result<NbestList, EngineError>> {
        self.run_batch(sentences, DecodeRequest::Nbest(n))
            .into_iter()
            .map(|result| match result? {
                DecodeOutput::Nbest(list) => Ok(list),
                DecodeOutput::Best(best) => Ok(NbestList {
                    translations: best.into_iter().collect(),
                    diagnostic: None,
                }),
            })
            .collect()
    }

    fn run_batch(
        &self,
        sentences: Vec<BatchSentence>,
        request: DecodeRequest,
    ) -> Vec<Result<DecodeOutput, EngineError>> {
        let _span = debug_span!("batch", sentences = sentences.len(), threads = self.pool.size()).entered();
        let count = sentences.len();
        let mut slots: Vec<Option<Result<DecodeOutput, EngineError>>> =
            std::iter::repeat_with(|| None).take(count).collect();

        let (reply_tx, reply_rx) = mpsc::channel::<DecodeResult>();
        for (index, sentence) in sentences.into_iter().enumerate() {
            let work = DecodeWork {
                index,
                sentence_id: sentence.sentence_id,
                source: sentence.source,
                constraints: sentence.constraints,
                request,
                reply: reply_tx.clone(),
            };
            if let Err(e) = self.pool.submit(work) {
                slots[index] = Some(Err(e));
            }
        }
        // Only in-flight work holds senders now, so the loop ends once every
        // job has replied or its worker is gone.
        drop(reply_tx);
        for result in reply_rx {
            slots[result.index] = Some(result.output.map_err(EngineError::from));
        }

        let mut lost = 0;
        let results: Vec<_> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    lost += 1;
                    Err(EngineError::WorkerLost { index })
                })
            })
            .collect();
        if lost > 0 {
            warn!(lost, "batch finished with missing results");
        }
        debug!(count, "batch decoded");
        results
    }
}
