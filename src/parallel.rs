//! Batch extraction across rayon threads.
//!
//! Each request gets its own [`MediaSession`](crate::MediaSession) on
//! whichever worker picks it up. Sessions share nothing but the engine
//! handle, which holds no per-session state.

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::engine::MediaEngine;
use crate::extract::{ExtractionRequest, ExtractionResult, FrameExtractor};
use crate::sink::FrameSink;

impl<E> FrameExtractor<E>
where
    E: MediaEngine + Sync,
{
    /// Run several requests in parallel.
    ///
    /// `make_sink` builds a fresh sink for every request, on the worker that
    /// runs it. Results come back in request order.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use framepeek::{ExtractionRequest, FfmpegEngine, FrameExtractor, ImageSink, OutputPattern};
    ///
    /// let extractor = FrameExtractor::new(FfmpegEngine::new()?);
    /// let requests = vec![
    ///     ExtractionRequest::new("a.mp4", OutputPattern::parse("a_%02d.png")?, 2),
    ///     ExtractionRequest::new("b.mp4", OutputPattern::parse("b_%02d.png")?, 2),
    /// ];
    /// let results = extractor.extract_batch(&requests, |_| ImageSink::new());
    /// assert_eq!(results.len(), 2);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn extract_batch<S, M>(
        &self,
        requests: &[ExtractionRequest],
        make_sink: M,
    ) -> Vec<ExtractionResult>
    where
        S: FrameSink<E::Frame>,
        M: Fn(&ExtractionRequest) -> S + Sync,
    {
        log::debug!("Starting batch of {} extraction requests", requests.len());
        requests
            .par_iter()
            .map(|request| {
                let mut sink = make_sink(request);
                self.extract(request, &mut sink)
            })
            .collect()
    }
}
