//! Shared fixtures for the integration tests: a scriptable fake transport and
//! helpers that fabricate API pages.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::{Notify, Semaphore};

use verdemap::prelude::*;

type Handler = Box<dyn Fn(&Url) -> Result<TransportResponse> + Send + Sync>;

/// Fake transport that records every request and answers from a handler
pub struct MockTransport {
    handler: Handler,
    script: Mutex<VecDeque<Result<TransportResponse>>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    called: Notify,
    gate: Option<Arc<Semaphore>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&Url) -> Result<TransportResponse> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            called: Notify::new(),
            gate: None,
            latency: None,
        }
    }

    /// Serve one page of `count` records per category on every request
    pub fn pages_of(count: usize) -> Self {
        Self::new(move |url| {
            let category = query(url, "type").unwrap_or_default();
            let page = query(url, "pagenumber").unwrap_or_default();
            Ok(TransportResponse::ok(point_page(
                &format!("{}-{}", category, page),
                count,
            )))
        })
    }

    /// Answer the first requests from `script`, then fall back to the handler
    pub fn with_script(self, script: Vec<Result<TransportResponse>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    /// Hold every request until the gate hands out a permit
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    /// Values of the `type` parameter, in request order
    pub fn requested_types(&self) -> Vec<String> {
        self.urls()
            .iter()
            .filter_map(|url| query(url, "type"))
            .collect()
    }

    /// Resolve once at least `n` requests have been issued
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        self.urls.lock().unwrap().push(url.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_waiters();

        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| MapError::Network("gate closed".to_string()))?;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => (self.handler)(url),
        }
    }
}

/// Value of query parameter `name`
pub fn query(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// JSON array of `count` point records with ids `{prefix}-{i}`
pub fn point_page(prefix: &str, count: usize) -> String {
    let records: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "Id": format!("{}-{}", prefix, i),
                "Code": "T1",
                "Active": true,
                "Detail": { "en": { "Title": format!("Feature {}", i) } },
                "Geo": [{ "Geometry": format!("POINT(11.35 46.{:04})", i % 10_000), "Default": true }]
            })
        })
        .collect();
    serde_json::Value::Array(records).to_string()
}

pub fn status(code: u16) -> Result<TransportResponse> {
    Ok(TransportResponse::new(code, ""))
}

pub fn network_error() -> Result<TransportResponse> {
    Err(MapError::Network("connection reset".to_string()))
}

/// Config against a fake endpoint with no delays
pub fn quick_config() -> LoaderConfig {
    LoaderConfig {
        api: ApiConfig {
            base_url: "https://api.example.test/v1".to_string(),
            ..ApiConfig::default()
        },
        ..LoaderConfig::for_testing()
    }
}

/// Config against a fake endpoint with the production delays
pub fn production_config() -> LoaderConfig {
    LoaderConfig {
        api: ApiConfig {
            base_url: "https://api.example.test/v1".to_string(),
            ..ApiConfig::default()
        },
        ..LoaderConfig::default()
    }
}

/// A city-sized view around (46.5, 11.35)
pub fn city_view(zoom: f64) -> Viewport {
    Viewport::from_wsen(11.30, 46.45, 11.40, 46.55, zoom)
}

/// A view far enough away to land in a different tile
pub fn other_view(zoom: f64) -> Viewport {
    Viewport::from_wsen(12.30, 45.45, 12.40, 45.55, zoom)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
