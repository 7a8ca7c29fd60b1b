use bincode::{Decode, Encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WIRE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

impl WireFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" | "text" => Some(WireFormat::Json),
            "binary" | "bincode" => Some(WireFormat::Binary),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("empty binary frame")]
    InvalidData,
    #[error("json frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frame: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
    #[error("binary frame: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
}

pub fn encode_frame<M>(message: &M, format: WireFormat) -> Result<WireFrame, WireError>
where
    M: Serialize + Encode,
{
    match format {
        WireFormat::Json => Ok(WireFrame::Text(serde_json::to_string(message)?)),
        WireFormat::Binary => {
            let body = bincode::encode_to_vec(message, bincode::config::standard())?;
            let mut payload = Vec::with_capacity(body.len() + 1);
            payload.push(WIRE_VERSION);
            payload.extend_from_slice(&body);
            Ok(WireFrame::Binary(payload))
        }
    }
}

/// Frames are decoded by their own kind, whatever format the sender was configured with.
pub fn decode_frame<M>(frame: &WireFrame) -> Result<M, WireError>
where
    M: DeserializeOwned + Decode<()>,
{
    match frame {
        WireFrame::Text(text) => Ok(serde_json::from_str(text)?),
        WireFrame::Binary(payload) => {
            let (&version, body) = payload.split_first().ok_or(WireError::InvalidData)?;
            match version {
                1 => bincode::decode_from_slice(body, bincode::config::standard())
                    .map(|(message, _)| message)
                    .map_err(WireError::from),
                _ => Err(WireError::UnsupportedVersion(version)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientMessage, Point, RequestId, ServerMessage, Stroke, StrokeId, Tool};

    fn sample_stroke() -> Stroke {
        Stroke {
            stroke_id: StrokeId::new("peer", "1"),
            tool: Tool::Brush,
            color: "#336699".to_string(),
            width: 4.0,
            points: vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
        }
    }

    #[test]
    fn test_binary_frame_has_version_prefix() {
        let frame = encode_frame(&ClientMessage::Undo, WireFormat::Binary).unwrap();
        match frame {
            WireFrame::Binary(bytes) => assert_eq!(bytes[0], WIRE_VERSION),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_history_decodes() {
        let message = ServerMessage::History {
            strokes: vec![sample_stroke()],
        };
        let frame = encode_frame(&message, WireFormat::Binary).unwrap();
        let decoded: ServerMessage = decode_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let frame = WireFrame::Binary(vec![9, 0, 0]);
        let err = decode_frame::<ServerMessage>(&frame).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_empty_binary_frame_rejected() {
        let err = decode_frame::<ServerMessage>(&WireFrame::Binary(Vec::new())).unwrap_err();
        assert!(matches!(err, WireError::InvalidData));
    }

    #[test]
    fn test_json_ack_from_server_text() {
        let frame = WireFrame::Text(r#"{"type":"ack","requestId":3,"ok":false,"error":"nope"}"#.to_string());
        let decoded: ServerMessage = decode_frame(&frame).unwrap();
        assert_eq!(
            decoded,
            ServerMessage::Ack {
                request_id: RequestId(3),
                ok: false,
                label: None,
                error: Some("nope".to_string()),
            }
        );
    }

    #[test]
    fn test_wire_format_from_name() {
        assert_eq!(WireFormat::from_name(" Binary "), Some(WireFormat::Binary));
        assert_eq!(WireFormat::from_name("json"), Some(WireFormat::Json));
        assert_eq!(WireFormat::from_name("xml"), None);
    }
}
