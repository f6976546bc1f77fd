use serde::{Deserialize, Serialize};

use super::Target;

/// A message exchanged with the orchestrator.
///
/// Apart from the discriminator and the routing fields the content is opaque
/// to the session: APDUs are forwarded byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProtocolUnit {
    /// A command APDU for the card.
    Command {
        #[serde(with = "hex_payload")]
        payload: Vec<u8>,
    },
    /// The card's answer to the preceding command.
    Response {
        #[serde(with = "hex_payload")]
        payload: Vec<u8>,
    },
    #[serde(rename_all = "camelCase")]
    FieldRequest {
        field_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    FieldResponse { field_id: String, value: String },
    /// Terminal failure, or an abandonment notice when sent by the client.
    Error { message: String },
    /// Terminal success.
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ProtocolUnit {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolUnit::Command { .. } => "command",
            ProtocolUnit::Response { .. } => "response",
            ProtocolUnit::FieldRequest { .. } => "field-request",
            ProtocolUnit::FieldResponse { .. } => "field-response",
            ProtocolUnit::Error { .. } => "error",
            ProtocolUnit::Complete { .. } => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolUnit::Error { .. } | ProtocolUnit::Complete { .. })
    }
}

/// A unit tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub session_id: String,
    #[serde(flatten)]
    pub unit: ProtocolUnit,
}

impl Envelope {
    pub fn new(session_id: impl Into<String>, unit: ProtocolUnit) -> Self {
        Self {
            session_id: session_id.into(),
            unit,
        }
    }

    /// Unwraps the unit after checking that it belongs to `session_id`.
    pub fn open(self, session_id: &str) -> Result<ProtocolUnit, super::TransportError> {
        if self.session_id != session_id {
            return Err(super::TransportError::Protocol(format!(
                "unit for session {} received in session {session_id}",
                self.session_id
            )));
        }
        Ok(self.unit)
    }
}

/// Body of the request that opens a delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct DeliverRequest<'a> {
    pub target: &'a Target,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FetchRequest<'a> {
    pub session_id: &'a str,
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact).map_err(|e| D::Error::custom(format!("invalid APDU hex: {e}")))
    }
}
