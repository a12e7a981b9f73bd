/// Errors produced while decoding an inbound envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingType,

    #[error("`{msg_type}` message is missing `data.{field}`")]
    MissingField {
        msg_type: &'static str,
        field: &'static str,
    },
}
