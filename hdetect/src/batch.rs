//! Parallel fan-out of the aggregator over many texts.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::config::BatchConfig;
use crate::detection::Detection;
use crate::detector::SharedDetector;
use crate::engine::detect_text;
use crate::error::DetectError;

/// Run [`detect_text`] over every text on a bounded worker pool.
///
/// Texts are independent; the detector list is shared read-only. The result
/// vector is in input order whatever order the workers finish in.
///
/// # Errors
///
/// Returns [`DetectError::WorkerPool`] if the thread pool cannot be created.
pub fn detect_batch<S>(
    texts: &[S],
    detectors: &[SharedDetector],
    config: &BatchConfig,
) -> Result<Vec<Detection>, DetectError>
where
    S: AsRef<str> + Sync,
{
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("hdetect-batch-{i}"));
    if let Some(workers) = config.workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder
        .build()
        .map_err(|e| DetectError::WorkerPool(e.to_string()))?;

    tracing::debug!(
        texts = texts.len(),
        detectors = detectors.len(),
        workers = pool.current_num_threads(),
        "starting batch detection"
    );
    Ok(pool.install(|| {
        texts
            .par_iter()
            .map(|text| detect_text(text.as_ref(), detectors))
            .collect()
    }))
}
