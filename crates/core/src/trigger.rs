//! Normalization of upload notifications into an [`ObjectRef`].
//!
//! Two shapes are accepted: a direct `{bucket, name, contentType?}` body used
//! for manual triggers, and a push-subscription envelope
//! `{message: {data}}` where `data` carries the same object either as base64
//! encoded JSON, raw JSON text, or an inline JSON object.

use crate::error::IngestError;
use crate::models::ObjectRef;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectNotification {
    pub bucket: String,
    pub name: String,
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeMessage {
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngestTrigger {
    Direct(ObjectNotification),
    Enveloped { message: EnvelopeMessage },
}

impl IngestTrigger {
    pub fn from_json(value: Value) -> Result<Self, IngestError> {
        serde_json::from_value(value)
            .map_err(|_| IngestError::InvalidTrigger("Unknown event format".to_string()))
    }

    pub fn into_object_ref(self) -> Result<ObjectRef, IngestError> {
        let notification = match self {
            IngestTrigger::Direct(notification) => notification,
            IngestTrigger::Enveloped { message } => decode_envelope_data(message.data)?,
        };

        if notification.bucket.trim().is_empty() || notification.name.trim().is_empty() {
            return Err(IngestError::InvalidTrigger(
                "bucket and name must not be empty".to_string(),
            ));
        }

        Ok(ObjectRef {
            bucket: notification.bucket,
            object_name: notification.name,
            content_type: notification.content_type,
        })
    }
}

/// Decodes any accepted trigger body straight into an [`ObjectRef`].
pub fn normalize_trigger(value: Value) -> Result<ObjectRef, IngestError> {
    IngestTrigger::from_json(value)?.into_object_ref()
}

fn decode_envelope_data(data: Value) -> Result<ObjectNotification, IngestError> {
    let invalid = |details: String| IngestError::InvalidTrigger(format!("envelope data: {details}"));

    match data {
        Value::Object(_) => serde_json::from_value(data).map_err(|error| invalid(error.to_string())),
        Value::String(encoded) => {
            let trimmed = encoded.trim();
            let text = match STANDARD.decode(trimmed) {
                Ok(bytes) => String::from_utf8(bytes).map_err(|error| invalid(error.to_string()))?,
                Err(_) => trimmed.to_string(),
            };
            serde_json::from_str(&text).map_err(|error| invalid(error.to_string()))
        }
        other => Err(invalid(format!("unsupported payload type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_form_is_normalized() {
        let object = normalize_trigger(json!({
            "bucket": "uploads",
            "name": "q3.pdf",
            "contentType": "application/pdf"
        }))
        .expect("direct trigger should parse");

        assert_eq!(object.bucket, "uploads");
        assert_eq!(object.object_name, "q3.pdf");
        assert_eq!(object.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn direct_form_without_content_type() {
        let object = normalize_trigger(json!({"bucket": "uploads", "name": "report.txt"}))
            .expect("direct trigger should parse");
        assert_eq!(object.content_type, None);
        assert!(!object.is_pdf());
    }

    #[test]
    fn base64_envelope_is_decoded() {
        let inner = json!({"bucket": "uploads", "name": "a.pdf", "contentType": "application/pdf"});
        let data = STANDARD.encode(inner.to_string());

        let object = normalize_trigger(json!({"message": {"data": data}}))
            .expect("enveloped trigger should parse");

        assert_eq!(object, ObjectRef {
            bucket: "uploads".to_string(),
            object_name: "a.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
        });
    }

    #[test]
    fn raw_json_envelope_is_decoded() {
        let data = json!({"bucket": "uploads", "name": "b.pdf"}).to_string();
        let object = normalize_trigger(json!({"message": {"data": data}}))
            .expect("enveloped trigger should parse");
        assert_eq!(object.object_name, "b.pdf");
    }

    #[test]
    fn inline_object_envelope_is_decoded() {
        let object = normalize_trigger(json!({
            "message": {"data": {"bucket": "uploads", "name": "c.pdf"}}
        }))
        .expect("enveloped trigger should parse");
        assert_eq!(object.object_name, "c.pdf");
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(matches!(
            normalize_trigger(json!({"kind": "storage#object"})),
            Err(IngestError::InvalidTrigger(_))
        ));
        assert!(matches!(
            normalize_trigger(json!({"message": {"data": "not json at all"}})),
            Err(IngestError::InvalidTrigger(_))
        ));
        assert!(matches!(
            normalize_trigger(json!({"bucket": "", "name": "a.pdf"})),
            Err(IngestError::InvalidTrigger(_))
        ));
    }
}
