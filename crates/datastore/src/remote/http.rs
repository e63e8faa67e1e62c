use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use reqwest::header::ACCEPT;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::endpoint::TransportKind;
use super::transport::{FetchCallback, FetchRequest, Transport};
use crate::error::LoadError;

/// Fetches over HTTP with `reqwest`.
///
/// Each fetch is spawned with [`tokio::task::spawn_local`], so the store
/// must be driven from inside a [`tokio::task::LocalSet`] on a
/// current-thread runtime. The callback runs on that same event loop.
/// Without a runtime or a `LocalSet` the fetch fails with
/// [`LoadError::Network`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: FetchRequest, done: FetchCallback) {
        if let Err(err) = Handle::try_current() {
            warn!(source = %request.source, "http fetch outside a tokio runtime");
            return done(Err(LoadError::Network(err.to_string())));
        }

        // Shared with the task so a refused spawn can still report.
        let slot = Rc::new(RefCell::new(Some(done)));
        let task_slot = slot.clone();
        let client = self.client.clone();
        let spawned = panic::catch_unwind(AssertUnwindSafe(move || {
            tokio::task::spawn_local(async move {
                let result = fetch_body(&client, &request).await;
                debug!(
                    source = %request.source,
                    seq = request.seq,
                    ok = result.is_ok(),
                    "http fetch finished"
                );
                let done = task_slot.borrow_mut().take();
                if let Some(done) = done {
                    done(result);
                }
            })
        }));
        if spawned.is_err() {
            let done = slot.borrow_mut().take();
            if let Some(done) = done {
                done(Err(LoadError::Network(
                    "http fetch requires a tokio LocalSet".to_string(),
                )));
            }
        }
    }
}

async fn fetch_body(client: &reqwest::Client, request: &FetchRequest) -> Result<String, LoadError> {
    let accept = match request.transport {
        TransportKind::Json => "application/json, text/javascript",
        TransportKind::Xml => "application/xml, text/xml",
    };
    let response = client
        .get(&request.url)
        .header(ACCEPT, accept)
        .send()
        .await
        .map_err(|err| LoadError::Network(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Status(status.as_u16()));
    }
    response
        .text()
        .await
        .map_err(|err| LoadError::Network(err.to_string()))
}
