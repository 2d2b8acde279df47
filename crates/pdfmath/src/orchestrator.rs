//! Cache-checked, retrying, concurrent paragraph translation.
//!
//! Paragraphs are translated on a bounded rayon pool. Results come back in
//! input order regardless of completion order. Only retryable errors are
//! retried; a permanent error or a cache failure ends the batch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cache::{CacheStore, default_namespace, paragraph_key};
use crate::error::TranslateError;
use crate::translator::{Translator, is_trivial};

/// How failed translation calls are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per paragraph; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Wait before the first retry.
    pub backoff: Duration,
    /// Growth factor of the wait between consecutive retries.
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Fixed one-second backoff with no attempt limit.
    pub fn forever() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(retry.saturating_sub(1).min(64) as i32);
        if self.backoff.as_secs_f64() * factor >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_nanos((self.backoff.as_nanos() as f64 * factor).round() as u64)
    }

    fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

/// One paragraph on its way through translation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub index: usize,
    pub source: String,
    pub target: Option<String>,
}

/// Counters of one orchestrator.
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_writes: AtomicUsize,
    retries: AtomicUsize,
    skipped: AtomicUsize,
}

/// A point-in-time copy of [`OrchestratorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_writes: usize,
    pub retries: usize,
    /// Trivial paragraphs returned without a translation call.
    pub skipped: usize,
}

impl OrchestratorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Translates batches of paragraphs for one translator.
pub struct TranslationOrchestrator<'a> {
    translator: &'a dyn Translator,
    cache: Option<&'a dyn CacheStore>,
    namespace: String,
    identity: String,
    retry: RetryPolicy,
    pool: rayon::ThreadPool,
    stats: OrchestratorStats,
}

impl<'a> TranslationOrchestrator<'a> {
    /// Create an orchestrator running `threads` workers (at least one).
    pub fn new(
        translator: &'a dyn Translator,
        cache: Option<&'a dyn CacheStore>,
        retry: RetryPolicy,
        threads: usize,
    ) -> Result<Self, TranslateError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("pdfmath-translate-{i}"))
            .build()
            .map_err(|e| TranslateError::Permanent(format!("failed to start worker pool: {e}")))?;
        Ok(Self {
            translator,
            cache,
            namespace: default_namespace(),
            identity: translator.identity(),
            retry,
            pool,
            stats: OrchestratorStats::default(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Translate every text, returning results in input order.
    pub fn translate_all(&self, texts: &[String]) -> Result<Vec<String>, TranslateError> {
        let mut units: Vec<TranslationUnit> = texts
            .iter()
            .enumerate()
            .map(|(index, source)| TranslationUnit {
                index,
                source: source.clone(),
                target: None,
            })
            .collect();
        self.translate_units(&mut units)?;
        Ok(units
            .into_iter()
            .map(|u| u.target.unwrap_or(u.source))
            .collect())
    }

    /// Fill in `target` of every unit.
    pub fn translate_units(&self, units: &mut [TranslationUnit]) -> Result<(), TranslateError> {
        self.pool.install(|| {
            units
                .par_iter_mut()
                .try_for_each(|unit| -> Result<(), TranslateError> {
                    unit.target = Some(self.translate_one(&unit.source)?);
                    Ok(())
                })
        })
    }

    /// Translate one paragraph through the cache.
    pub fn translate_one(&self, text: &str) -> Result<String, TranslateError> {
        if is_trivial(text) {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(text.to_string());
        }

        let key = paragraph_key(text, &self.identity);
        if let Some(cache) = self.cache {
            if let Some(hit) = cache.get(&self.namespace, &key)? {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "translation cache hit");
                return Ok(hit);
            }
            self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        }

        let translated = self.call_with_retry(text)?;
        if let Some(cache) = self.cache {
            cache.put(&self.namespace, &key, &translated)?;
            self.stats.cache_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(translated)
    }

    fn call_with_retry(&self, text: &str) -> Result<String, TranslateError> {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            match self.translator.translate(text) {
                Ok(translated) => return Ok(translated),
                Err(err) if err.is_retryable() && self.retry.allows(attempt) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "translation failed, retrying"
                    );
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
