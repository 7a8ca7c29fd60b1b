mod app;
mod capture;
mod channel;
mod config;
mod error;
mod export;
mod geometry;
mod net;
mod presence;
mod raster;
mod reconcile;
mod render;
mod state;
mod util;

pub mod transport;

pub use app::Whiteboard;
pub use capture::{ActiveStroke, Capture, CaptureMode, RepaintScheduler};
pub use channel::{ConnectionState, EventSink, SyncChannel};
pub use config::{
    BoardConfig, DEFAULT_BACKGROUND, DEFAULT_COLOR, DEFAULT_WIDTH, MAX_BACKGROUND_LEN, MAX_WIDTH,
    MIN_DISPLAY_NAME_LEN, MIN_WIDTH,
};
pub use error::{ChannelError, ClearError, ExportError, NameError, RequestKind, TransportError};
pub use export::{
    escape_xml, export_raster, export_vector, parse_history_bytes, parse_history_text,
    ExportedImage, RasterFormat, DEFAULT_JPEG_QUALITY, VECTOR_MIME,
};
pub use geometry::{clamp_width, normalize_point, smooth_path, width_from_str};
pub use net::{room_from_path, websocket_url};
pub use presence::{fallback_label, Presence};
pub use raster::{css_rgba, rasterize};
pub use reconcile::{sanitize_segment, sanitize_stroke, History, Upsert};
pub use render::{DrawOp, Layer, Surfaces, Viewport};
pub use state::{sanitize_background, DrawingSession, StrokeStyle};
pub use util::{make_client_token, make_stroke_id};

pub use inkrelay_shared as shared;
