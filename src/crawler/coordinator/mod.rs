#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::crawler::{CrawlBackendClient, RunStatus};
use crate::embeddings::{EmbeddingClient, page_text};
use crate::models::EnrichedPageContext;
use crate::storage::{PageContextStore, normalize_url};

/// Broadcast value for one in-flight crawl.
#[derive(Debug, Clone)]
enum CrawlSignal {
    Pending,
    Done(Option<EnrichedPageContext>),
}

type InFlightMap = Mutex<HashMap<String, watch::Receiver<CrawlSignal>>>;

/// Orchestrates crawls against the external backend with a single-flight
/// guarantee per normalized URL: the first caller leads the crawl, later
/// callers await the same outcome instead of re-triggering.
pub struct CrawlCoordinator {
    client: CrawlBackendClient,
    embedder: EmbeddingClient,
    store: Arc<PageContextStore>,
    poll_interval: Duration,
    timeout: Duration,
    in_flight: InFlightMap,
}

impl CrawlCoordinator {
    #[inline]
    pub fn new(
        client: CrawlBackendClient,
        embedder: EmbeddingClient,
        store: Arc<PageContextStore>,
        config: &CrawlConfig,
    ) -> Self {
        Self {
            client,
            embedder,
            store,
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            timeout: Duration::from_secs(config.timeout_seconds),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this process has a crawl in flight for the URL.
    #[inline]
    pub fn has_in_flight(&self, url: &str) -> bool {
        let key = normalize_url(url);
        self.in_flight
            .lock()
            .map(|map| map.contains_key(&key))
            .unwrap_or(false)
    }

    /// Crawl a URL and wait for the enriched context, or join a crawl
    /// already in flight for the same URL. Never fails: every error path
    /// resolves to `None` after clearing the crawling flag.
    #[inline]
    pub async fn crawl_and_wait(&self, url: &str) -> Option<EnrichedPageContext> {
        if !self.client.is_enabled() {
            debug!("Crawl backend disabled; skipping crawl for {}", url);
            return None;
        }

        let key = normalize_url(url);

        enum Role {
            Leader(watch::Sender<CrawlSignal>),
            Follower(watch::Receiver<CrawlSignal>),
        }

        let role = {
            let locked = self.in_flight.lock();
            let Ok(mut map) = locked else {
                warn!("In-flight map lock poisoned; skipping crawl for {}", key);
                return None;
            };
            if let Some(rx) = map.get(&key) {
                Role::Follower(rx.clone())
            } else {
                let (tx, rx) = watch::channel(CrawlSignal::Pending);
                map.insert(key.clone(), rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Follower(mut rx) => {
                debug!("Joining in-flight crawl for {}", key);
                let outcome = rx
                    .wait_for(|signal| matches!(signal, CrawlSignal::Done(_)))
                    .await;
                match outcome {
                    Ok(signal) => match &*signal {
                        CrawlSignal::Done(context) => context.clone(),
                        CrawlSignal::Pending => None,
                    },
                    // Leader vanished without signaling; fall back to the
                    // cache it may have written
                    Err(_) => self.store.get_enriched(&key),
                }
            }
            Role::Leader(tx) => {
                let guard = InFlightGuard {
                    in_flight: &self.in_flight,
                    key: key.clone(),
                    tx,
                };
                let context = self.run_crawl(&key).await;
                guard.finish(context.clone());
                context
            }
        }
    }

    /// One full crawl: mark crawling, trigger, poll to a terminal state
    /// or deadline, then parse, embed, and store.
    async fn run_crawl(&self, url: &str) -> Option<EnrichedPageContext> {
        if let Err(e) = self.store.set_crawling_status(url, true).await {
            warn!("Failed to mark {} as crawling: {e:#}", url);
        }

        let run = match self.client.trigger_crawl(url) {
            Ok(run) => run,
            Err(e) => {
                warn!("Crawl trigger failed for {}: {e:#}", url);
                self.clear_crawling_flag(url).await;
                return None;
            }
        };

        let deadline = Instant::now() + self.timeout;
        info!(
            "Waiting up to {:?} for crawl of {} (run {})",
            self.timeout, url, run.id
        );

        loop {
            sleep(self.poll_interval).await;

            if Instant::now() >= deadline {
                warn!("Crawl of {} timed out (run {})", url, run.id);
                break;
            }

            let status = match self.client.run_status(&run.id) {
                Ok(current) => current,
                Err(e) => {
                    debug!("Status poll failed for run {}: {e:#}", run.id);
                    continue;
                }
            };

            match status.status {
                RunStatus::Succeeded => {
                    info!("Crawl of {} succeeded (run {})", url, run.id);
                    match self.process_success(url, &status).await {
                        Some(context) => return Some(context),
                        None => break,
                    }
                }
                terminal if terminal.is_terminal() => {
                    warn!("Crawl of {} ended with status {}", url, terminal);
                    break;
                }
                _ => {}
            }
        }

        self.clear_crawling_flag(url).await;
        None
    }

    /// Parse the first dataset record, attach an embedding when the
    /// service cooperates, and store the result.
    async fn process_success(
        &self,
        url: &str,
        run: &crate::crawler::RunData,
    ) -> Option<EnrichedPageContext> {
        let records = match self.client.fetch_results(run) {
            Ok(records) => records,
            Err(e) => {
                warn!("Result fetch failed for run {}: {e:#}", run.id);
                return None;
            }
        };

        let Some(record) = records.into_iter().next() else {
            warn!("Run {} returned no records", run.id);
            return None;
        };

        let mut context = record.into_context(url, &run.id);

        match self.embedder.embed(&page_text(&context)) {
            Ok(embedding) => context.embedding = Some(embedding),
            Err(e) => {
                // Stored without an embedding; the enricher back-fills later
                warn!("Embedding generation failed for {}: {e:#}", url);
            }
        }

        if let Err(e) = self.store.store_enriched_context(context.clone()).await {
            warn!("Failed to store enriched context for {}: {e:#}", url);
            return None;
        }

        Some(context)
    }

    async fn clear_crawling_flag(&self, url: &str) {
        if let Err(e) = self.store.set_crawling_status(url, false).await {
            warn!("Failed to clear crawling flag for {}: {e:#}", url);
        }
    }
}

/// Releases the in-flight slot and wakes waiters on every exit path,
/// including panics in the leader.
struct InFlightGuard<'a> {
    in_flight: &'a InFlightMap,
    key: String,
    tx: watch::Sender<CrawlSignal>,
}

impl InFlightGuard<'_> {
    fn finish(self, context: Option<EnrichedPageContext>) {
        self.release(context);
    }

    fn release(&self, context: Option<EnrichedPageContext>) {
        let locked = self.in_flight.lock();
        if let Ok(mut map) = locked {
            map.remove(&self.key);
        }
        // Waiters hold receiver clones, so this send reaches them even
        // though the map entry is gone
        let _ = self.tx.send(CrawlSignal::Done(context));
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if matches!(&*self.tx.borrow(), CrawlSignal::Pending) {
            self.release(None);
        }
    }
}
