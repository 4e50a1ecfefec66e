use std::{pin::Pin, sync::Arc};

use futures::{Stream, StreamExt};

use crate::parse::ParseError;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    /// 1-based data row number within the source file, for diagnostics.
    pub row: usize,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, row: usize) -> Self {
        Self { payload, row }
    }
}

/// Errors flowing through an import pipeline.
///
/// `Parse` and `Transform` reject a single row; the sink counts them and keeps going.
/// `Source` and `Sink` abort the whole batch.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("row {row}: {source}")]
    Parse {
        row: usize,
        #[source]
        source: ParseError,
    },
    #[error("row {row}: {reason}")]
    Transform { row: usize, reason: String },
    #[error("sink error: {0}")]
    Sink(String),
}

impl PipelineError {
    /// Whether the error only rejects one row rather than the whole batch.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Transform { .. })
    }
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    type Output: Send;

    async fn run<S>(&self, input: S) -> Result<Self::Output, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>, // same-type transforms chain
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<K::Output, PipelineError> {
        let mut stream = self.source.stream().await;

        // Apply transforms in sequence (if any).
        for t in self.transforms {
            let t_arc = t.clone();
            stream = Box::pin(stream.then(move |item| {
                let t_inner = t_arc.clone();
                async move {
                    match item {
                        Ok(env) => t_inner.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        self.sink.run(stream).await
    }
}
