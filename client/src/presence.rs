use std::collections::BTreeMap;

use inkrelay_shared::{Cursor, User};

use crate::geometry::normalize_point;

/// Latest user list and remote cursors, keyed by connection id.
#[derive(Clone, Debug, Default)]
pub struct Presence {
    local_id: Option<String>,
    users: Vec<User>,
    cursors: BTreeMap<String, Cursor>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local_id(&mut self, id: &str) {
        self.local_id = Some(id.to_string());
        self.cursors.remove(id);
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn local_user(&self) -> Option<&User> {
        let local_id = self.local_id.as_deref()?;
        self.users.iter().find(|user| user.id == local_id)
    }

    /// Stores the snapshot and returns the local user's display label, if listed.
    pub fn apply_users(&mut self, users: Vec<User>) -> Option<String> {
        self.users = users;
        let local = self.local_user()?;
        Some(
            local
                .label
                .clone()
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| fallback_label(&local.id)),
        )
    }

    pub fn apply_cursors(&mut self, cursors: Vec<Cursor>) {
        let mut next = BTreeMap::new();
        for mut cursor in cursors {
            if cursor.id.is_empty() || self.local_id.as_deref() == Some(cursor.id.as_str()) {
                continue;
            }
            let Some(position) = cursor.position.and_then(normalize_point) else {
                continue;
            };
            cursor.position = Some(position);
            next.insert(cursor.id.clone(), cursor);
        }
        self.cursors = next;
    }

    pub fn cursors(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.values()
    }

    pub fn cursor(&self, id: &str) -> Option<&Cursor> {
        self.cursors.get(id)
    }

    pub fn clear(&mut self) {
        self.users.clear();
        self.cursors.clear();
    }
}

pub fn fallback_label(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() < 4 {
        return "User".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("User {}", tail.to_uppercase())
}
