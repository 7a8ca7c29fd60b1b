use std::fmt;

use bincode::{Decode, Encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

mod wire;

pub use wire::{decode_frame, encode_frame, WireError, WireFormat, WireFrame, WIRE_VERSION};

const ORIGIN_SEPARATOR: char = ':';

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    pub fn round(self) -> Point {
        Point {
            x: self.x.round(),
            y: self.y.round(),
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

impl Tool {
    /// Anything that is not literally `"eraser"` selects the brush.
    pub fn from_name(name: &str) -> Self {
        if name == "eraser" {
            Tool::Eraser
        } else {
            Tool::Brush
        }
    }
}

/// Stroke identity: `<origin>:<token>`. The origin names the authoring session.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct StrokeId(String);

impl StrokeId {
    pub fn new(origin: &str, token: &str) -> Self {
        Self(format!("{origin}{ORIGIN_SEPARATOR}{token}"))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_origin(&self, origin: &str) -> bool {
        !origin.is_empty()
            && self
                .0
                .strip_prefix(origin)
                .is_some_and(|rest| rest.starts_with(ORIGIN_SEPARATOR))
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_width() -> f64 {
    1.0
}

/// One pairwise movement inside a stroke that is still being drawn.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub stroke_id: StrokeId,
    #[serde(default)]
    pub tool: Tool,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_width")]
    pub width: f64,
    pub from: Point,
    pub to: Point,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub stroke_id: StrokeId,
    #[serde(default)]
    pub tool: Tool,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn is_renderable(&self) -> bool {
        self.points.len() >= 2
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct Cursor {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub position: Option<Point>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, Default, PartialEq)]
pub struct NameResult {
    pub ok: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "segment")]
    Segment(Segment),
    #[serde(rename = "stroke:complete")]
    StrokeComplete(Stroke),
    #[serde(rename = "undo")]
    Undo,
    #[serde(rename = "redo")]
    Redo,
    #[serde(rename = "clear", rename_all = "camelCase")]
    Clear {
        request_id: RequestId,
        background: String,
    },
    #[serde(rename = "cursor:move")]
    CursorMove { position: Option<Point> },
    #[serde(rename = "name:set", rename_all = "camelCase")]
    SetDisplayName { request_id: RequestId, name: String },
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome", rename_all = "camelCase")]
    Welcome { session_id: String },
    #[serde(rename = "segment")]
    Segment(Segment),
    #[serde(rename = "stroke:complete")]
    StrokeComplete(Stroke),
    #[serde(rename = "history")]
    History {
        #[serde(deserialize_with = "skip_invalid")]
        strokes: Vec<Stroke>,
    },
    #[serde(rename = "users")]
    UserList {
        #[serde(deserialize_with = "skip_invalid")]
        users: Vec<User>,
    },
    #[serde(rename = "cursors")]
    Cursors {
        #[serde(deserialize_with = "skip_invalid")]
        cursors: Vec<Cursor>,
    },
    #[serde(rename = "name:result")]
    DisplayNameResult(NameResult),
    #[serde(rename = "clear")]
    CanvasCleared {
        #[serde(default)]
        background: Option<String>,
    },
    #[serde(rename = "ack", rename_all = "camelCase")]
    Ack {
        request_id: RequestId,
        ok: bool,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Segment(_) => "segment",
            ServerMessage::StrokeComplete(_) => "stroke:complete",
            ServerMessage::History { .. } => "history",
            ServerMessage::UserList { .. } => "users",
            ServerMessage::Cursors { .. } => "cursors",
            ServerMessage::DisplayNameResult(_) => "name:result",
            ServerMessage::CanvasCleared { .. } => "clear",
            ServerMessage::Ack { .. } => "ack",
        }
    }
}

/// Decodes a list entry by entry, dropping the entries that do not parse.
fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(error) => {
                log::warn!("skipping malformed entry: {error}");
                None
            }
        })
        .collect();
    if items.len() < total {
        log::warn!("kept {} of {total} entries", items.len());
    }
    Ok(items)
}
