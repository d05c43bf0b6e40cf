//! Completion fallback chain.
//!
//! Each request walks the endpoints in configured order. Only endpoint failures
//! (see [`ConciergeError::is_endpoint_failure`]) move on to the next endpoint; a
//! rejected request is returned to the agent at once. An endpoint that fails
//! three requests in a row is benched for a minute. When every endpoint is
//! benched the whole chain is tried anyway.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::provider::{GenerateParams, Provider};
use concierge_core::types::{Message, ProviderResponse, ToolDefinition};

const STRIKES_TO_BENCH: u32 = 3;
const BENCH_TIME: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Strikes {
    count: u32,
    benched_until: Option<Instant>,
}

struct Endpoint {
    provider: Box<dyn Provider>,
    strikes: Mutex<Strikes>,
}

impl Endpoint {
    fn is_benched(&self, now: Instant) -> bool {
        self.strikes
            .lock()
            .map(|s| s.benched_until.is_some_and(|until| now < until))
            .unwrap_or(false)
    }

    fn clear(&self) {
        if let Ok(mut s) = self.strikes.lock() {
            *s = Strikes::default();
        }
    }

    /// Returns the strike count after this failure.
    fn strike(&self, bench_time: Duration) -> u32 {
        let Ok(mut s) = self.strikes.lock() else {
            return 0;
        };
        s.count += 1;
        if s.count >= STRIKES_TO_BENCH {
            s.benched_until = Some(Instant::now() + bench_time);
        }
        s.count
    }
}

pub struct FallbackChain {
    endpoints: Vec<Endpoint>,
    bench_time: Duration,
}

impl FallbackChain {
    /// The first provider is the primary.
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(ConciergeError::Config("llm fallback chain is empty".into()));
        }
        Ok(Self {
            endpoints: providers
                .into_iter()
                .map(|provider| Endpoint {
                    provider,
                    strikes: Mutex::new(Strikes::default()),
                })
                .collect(),
            bench_time: BENCH_TIME,
        })
    }

    #[cfg(test)]
    fn with_bench_time(mut self, bench_time: Duration) -> Self {
        self.bench_time = bench_time;
        self
    }

    fn candidates(&self) -> Vec<(usize, &Endpoint)> {
        let now = Instant::now();
        let active: Vec<(usize, &Endpoint)> = self
            .endpoints
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_benched(now))
            .collect();
        if active.is_empty() {
            tracing::warn!("⚠️ Every completion endpoint is benched, trying all of them");
            self.endpoints.iter().enumerate().collect()
        } else {
            active
        }
    }
}

#[async_trait]
impl Provider for FallbackChain {
    fn name(&self) -> &str {
        self.endpoints.first().map(|e| e.provider.name()).unwrap_or("fallback-chain")
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        let mut last_error = None;

        for (idx, endpoint) in self.candidates() {
            let name = endpoint.provider.name();
            match endpoint.provider.chat(messages, tools, params).await {
                Ok(response) => {
                    endpoint.clear();
                    if idx > 0 {
                        tracing::info!("🔁 Completion served by fallback {name}");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_endpoint_failure() => {
                    let strikes = endpoint.strike(self.bench_time);
                    tracing::warn!("⚠️ Completion endpoint {name} failed ({strikes} in a row): {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ConciergeError::completion("no completion endpoint answered")))
    }
}
