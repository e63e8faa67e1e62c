//! Lazily loaded remote sources.
//!
//! A source starts `NotLoaded`. The first navigation (or an explicit
//! [`load`](crate::DataNode::load)) issues one fetch through the store's
//! [`Transport`]; the response is parsed into a backing node that the source
//! delegates to from then on. Every fetch carries a sequence number and only
//! the completion of the most recently issued fetch is applied.

mod endpoint;
mod http;
mod payload;
mod transport;

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

pub use endpoint::{Envelope, RemoteConfig, TransportKind};
pub use http::HttpTransport;
pub use transport::{FetchCallback, FetchRequest, NullTransport, QueuedTransport, Transport};

use crate::error::LoadError;
use crate::node::{DataNode, NodeKind, RemoteNode};

/// Lifecycle of a remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::NotLoaded => "not-loaded",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub(crate) struct SourceState {
    pub(crate) config: RemoteConfig,
    pub(crate) state: LoadState,
    pub(crate) latest_seq: u64,
    pub(crate) backing: Option<DataNode>,
    pub(crate) last_error: Option<LoadError>,
}

impl SourceState {
    pub(crate) fn new(config: RemoteConfig) -> Self {
        SourceState {
            config,
            state: LoadState::NotLoaded,
            latest_seq: 0,
            backing: None,
            last_error: None,
        }
    }
}

/// Issue a fetch for `node` if it is a remote source.
///
/// Without `force` this is a no-op while a fetch is in flight or once the
/// source has loaded; a failed source is fetched again. With `force` a new
/// fetch supersedes the running one.
pub(crate) fn begin_load(node: &DataNode, force: bool) {
    let (seq, request) = {
        let mut kind = node.kind_mut();
        let NodeKind::Remote(RemoteNode::Source(source)) = &mut *kind else {
            return;
        };
        if !force && matches!(source.state, LoadState::Loading | LoadState::Loaded) {
            trace!(source = node.data_name(), state = %source.state, "load not needed");
            return;
        }
        source.latest_seq += 1;
        source.state = LoadState::Loading;
        let seq = source.latest_seq;
        let request = source.config.resolve_url().map(|url| FetchRequest {
            source: node.data_name().to_string(),
            url,
            transport: source.config.transport,
            seq,
        });
        (seq, request)
    };

    let request = match request {
        Ok(request) => request,
        Err(err) => return complete_load(node, seq, Err(err)),
    };
    let transport: Rc<dyn Transport> = match node.store() {
        Some(store) => store.transport(),
        None => Rc::new(NullTransport),
    };
    debug!(source = %request.source, url = %request.url, seq, "issuing fetch");
    let target = node.downgrade();
    transport.fetch(
        request,
        Box::new(move |result| {
            if let Some(node) = target.upgrade() {
                complete_load(&node, seq, result);
            }
        }),
    );
}

/// Apply the outcome of fetch `seq`. Completions of superseded fetches are
/// dropped here and nowhere else.
fn complete_load(node: &DataNode, seq: u64, result: Result<String, LoadError>) {
    let config = {
        let kind = node.kind_ref();
        let NodeKind::Remote(RemoteNode::Source(source)) = &*kind else {
            return;
        };
        if seq != source.latest_seq {
            trace!(
                source = node.data_name(),
                seq,
                latest = source.latest_seq,
                "dropping stale response"
            );
            return;
        }
        source.config.clone()
    };

    let outcome = result.and_then(|body| payload::build_backing(node, &body, &config));

    let notify = {
        let mut kind = node.kind_mut();
        let NodeKind::Remote(RemoteNode::Source(source)) = &mut *kind else {
            return;
        };
        match outcome {
            Ok(backing) => {
                source.backing = Some(backing);
                source.state = LoadState::Loaded;
                source.last_error = None;
                debug!(source = node.data_name(), seq, state = %source.state, "load complete");
                true
            }
            Err(err) => {
                warn!(source = node.data_name(), seq, error = %err, "load failed");
                source.state = LoadState::Failed;
                source.last_error = Some(err);
                source.config.notify_on_failure
            }
        }
    };
    if notify {
        node.notify();
    }
}
