//! Remote stylesheet loading.
//!
//! A cell's presentation can point at a remote CSS source. Changing
//! the source aborts any fetch still in flight, so a slow old fetch
//! can never overwrite the result of a newer one. Fetched text may be
//! wrapped in a dev-server JS module shim; [`unwrap_vite_css`] peels
//! that off before the text is stored.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Where stylesheet text comes from. Swappable for tests.
#[async_trait]
pub trait StyleSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> anyhow::Result<String>;
}

/// Fetches over HTTP. Non-2xx statuses are errors.
pub struct HttpStyleSource {
    client: reqwest::Client,
}

impl HttpStyleSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpStyleSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StyleSource for HttpStyleSource {
    async fn fetch(&self, url: &Url) -> anyhow::Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }
}

/// A stylesheet slot whose content follows its source URL.
pub struct FetchableStyle {
    source: Arc<dyn StyleSource>,
    css: Arc<Mutex<String>>,
    src: Option<Url>,
    controller: Option<CancellationToken>,
    updates_tx: watch::Sender<u64>,
    updates_rx: watch::Receiver<u64>,
}

impl FetchableStyle {
    pub fn new(source: Arc<dyn StyleSource>) -> Self {
        let (updates_tx, updates_rx) = watch::channel(0u64);
        Self {
            source,
            css: Arc::new(Mutex::new(String::new())),
            src: None,
            controller: None,
            updates_tx,
            updates_rx,
        }
    }

    /// Points the slot at a new URL and starts fetching it. The
    /// previous fetch, if still running, is aborted first. An invalid
    /// URL is logged and ignored.
    pub fn set_src(&mut self, src: &str) {
        let url = match Url::parse(src) {
            Ok(url) => url,
            Err(e) => {
                warn!(src, "ignoring invalid stylesheet url: {e}");
                return;
            }
        };
        if let Some(token) = self.controller.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        self.controller = Some(token.clone());
        self.src = Some(url.clone());

        let source = self.source.clone();
        let css = self.css.clone();
        let updates = self.updates_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(%url, "stylesheet fetch aborted");
                }
                result = source.fetch(&url) => {
                    match result {
                        Ok(text) => {
                            let text = unwrap_vite_css(&text);
                            *css.lock().unwrap_or_else(|p| p.into_inner()) = text;
                            debug!(%url, "stylesheet loaded");
                        }
                        Err(e) => warn!(%url, "stylesheet fetch failed: {e}"),
                    }
                    updates.send_modify(|n| *n += 1);
                }
            }
        });
    }

    pub fn src(&self) -> Option<&Url> {
        self.src.as_ref()
    }

    pub fn css(&self) -> String {
        self.css.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Ticks once per finished fetch attempt, success or failure.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates_rx.clone()
    }
}

/// Dev servers ship CSS as a JS module of the form
/// `const __vite__css = "..."` with escaped newlines. Returns the
/// embedded stylesheet text, or the input unchanged when the marker is
/// absent. The string ends at the first unescaped quote; only the JS
/// string escapes (`\n`, `\r`, `\"`, `\\`) are rewritten, so CSS
/// escapes like `\2014` survive.
pub fn unwrap_vite_css(text: &str) -> String {
    const MARKER: &str = "const __vite__css = \"";
    let Some(start) = text.find(MARKER) else {
        return text.to_string();
    };
    let mut out = String::new();
    let mut chars = text[start + MARKER.len()..].chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => {}
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    out
}
