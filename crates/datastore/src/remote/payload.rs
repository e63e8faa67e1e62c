//! Turning a fetched body into backing nodes.

use serde_json::Value;

use super::endpoint::{Envelope, RemoteConfig, TransportKind};
use crate::error::LoadError;
use crate::node::{build_document, DataNode, NodeKind};

/// Strip the envelope markers (surrounding whitespace is ignored).
pub(crate) fn strip_envelope<'a>(
    body: &'a str,
    envelope: Option<&Envelope>,
) -> Result<&'a str, LoadError> {
    let mut body = body.trim();
    let Some(envelope) = envelope else {
        return Ok(body);
    };
    if !envelope.prefix.is_empty() {
        body = body
            .strip_prefix(envelope.prefix.as_str())
            .ok_or_else(|| LoadError::Envelope(envelope.prefix.clone()))?;
    }
    if !envelope.suffix.is_empty() {
        body = body
            .strip_suffix(envelope.suffix.as_str())
            .ok_or_else(|| LoadError::Envelope(envelope.suffix.clone()))?;
    }
    Ok(body.trim())
}

/// Parse `body` into a node that takes the place of `source`: same name,
/// same path, same parent.
pub(crate) fn build_backing(
    source: &DataNode,
    body: &str,
    config: &RemoteConfig,
) -> Result<DataNode, LoadError> {
    let body = strip_envelope(body, config.envelope.as_ref())?;
    match config.transport {
        TransportKind::Json => {
            let value: Value =
                serde_json::from_str(body).map_err(|err| LoadError::Json(err.to_string()))?;
            Ok(source.twin(NodeKind::from_value(value)))
        }
        TransportKind::Xml => build_document(
            source.data_name().to_string(),
            source.data_path().to_string(),
            source.parent_link(),
            source.store_link(),
            body,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope {
            prefix: "handle(".into(),
            suffix: ");".into(),
        }
    }

    #[test]
    fn envelope_is_stripped() {
        let body = "  handle({\"a\": 1});\n";
        assert_eq!(strip_envelope(body, Some(&envelope())).unwrap(), "{\"a\": 1}");
        assert_eq!(strip_envelope(" [1] ", None).unwrap(), "[1]");
    }

    #[test]
    fn missing_markers() {
        assert_eq!(
            strip_envelope("{\"a\": 1});", Some(&envelope())),
            Err(LoadError::Envelope("handle(".into()))
        );
        assert_eq!(
            strip_envelope("handle({\"a\": 1})", Some(&envelope())),
            Err(LoadError::Envelope(");".into()))
        );
    }

    #[test]
    fn json_backing_takes_the_source_path() {
        let seat = DataNode::from_json("$albums", json!(null));
        let backing = build_backing(&seat, "[{\"id\": \"a1\"}]", &RemoteConfig::json("/x")).unwrap();
        assert_eq!(backing.data_path(), "$albums");
        assert_eq!(backing.kind(), NodeType::List);
        assert_eq!(
            backing.child_node("a1", false).unwrap().data_path(),
            "$albums/a1"
        );
    }

    #[test]
    fn parse_errors() {
        let seat = DataNode::from_json("$x", json!(null));
        let err = build_backing(&seat, "{oops", &RemoteConfig::json("/x")).unwrap_err();
        assert!(matches!(err, LoadError::Json(_)));
        let err = build_backing(&seat, "<a>", &RemoteConfig::xml("/x")).unwrap_err();
        assert!(matches!(err, LoadError::Xml(_)));
    }
}
