use url::Url;

use crate::error::TransportError;

/// Maps a page or server origin to the room's WebSocket endpoint.
pub fn websocket_url(base: &str, room: Option<&str>) -> Result<String, TransportError> {
    let mut url = Url::parse(base).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(TransportError::InvalidUrl(format!("unsupported scheme {other}")));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidUrl(format!("cannot switch {base} to {scheme}")))?;
    match room.map(str::trim).filter(|room| !room.is_empty()) {
        Some(room) => url.set_path(&format!("/ws/{room}")),
        None => url.set_path("/ws"),
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Extracts the room from a `/s/<room>` page path.
pub fn room_from_path(path: &str) -> Option<String> {
    let mut parts = path.trim_matches('/').split('/');
    if parts.next()? != "s" {
        return None;
    }
    let room = parts.next()?;
    if room.is_empty() {
        None
    } else {
        Some(room.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_schemes() {
        assert_eq!(
            websocket_url("https://board.example.com/s/abc?x=1", Some("abc")).unwrap(),
            "wss://board.example.com/ws/abc"
        );
        assert_eq!(
            websocket_url("http://localhost:3000", None).unwrap(),
            "ws://localhost:3000/ws"
        );
        assert!(websocket_url("ftp://example.com", None).is_err());
    }

    #[test]
    fn test_room_from_path() {
        assert_eq!(room_from_path("/s/team-42"), Some("team-42".to_string()));
        assert_eq!(room_from_path("/s/"), None);
        assert_eq!(room_from_path("/other/x"), None);
    }
}
