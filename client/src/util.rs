use uuid::Uuid;

use inkrelay_shared::StrokeId;

pub fn make_stroke_id(origin: &str) -> StrokeId {
    StrokeId::new(origin, &Uuid::new_v4().simple().to_string())
}

/// Provisional origin used until the server announces a session id.
pub fn make_client_token() -> String {
    format!("local-{}", Uuid::new_v4().simple())
}
