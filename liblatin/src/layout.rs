//! Keyboard geometry and the nearby-key table used to generate typo
//! variants.
use serde::{Deserialize, Serialize};

/// One key. `code` is the character the key types; codes up to 32
/// (backspace, return, space) are not letters and take no part in
/// prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub code: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Key {
    pub fn new(code: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { code, x, y, width, height }
    }

    fn is_special(&self) -> bool {
        self.code <= 32
    }

    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Squared distance from a point to the nearest edge of the key; zero
    /// inside it.
    fn squared_distance_to_edge(&self, px: f64, py: f64) -> f64 {
        let edge_x = px.clamp(self.x, self.x + self.width);
        let edge_y = py.clamp(self.y, self.y + self.height);
        let dx = px - edge_x;
        let dy = py - edge_y;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardLayout {
    pub key_width: f64,
    pub key_height: f64,
    pub keys: Vec<Key>,
}

impl KeyboardLayout {
    /// A plain QWERTY layout with staggered rows, a backspace and a space bar.
    pub fn qwerty() -> Self {
        const W: f64 = 30.0;
        const H: f64 = 40.0;
        let rows = [("qwertyuiop", 0.0), ("asdfghjkl", W / 2.0), ("zxcvbnm", W * 1.5)];
        let mut keys = Vec::new();
        for (row, (letters, indent)) in rows.iter().enumerate() {
            for (i, ch) in letters.chars().enumerate() {
                keys.push(Key::new(ch as u32, indent + i as f64 * W, row as f64 * H, W, H));
            }
        }
        keys.push(Key::new(8, W * 8.5, H * 2.0, W * 1.5, H));
        keys.push(Key::new(32, W * 2.0, H * 3.0, W * 6.0, H));
        Self {
            key_width: W,
            key_height: H,
            keys,
        }
    }
}

/// For every letter key, the letters whose key centres lie close to it,
/// including the key itself. Kept in layout order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbyKeys {
    entries: Vec<(u32, Vec<u32>)>,
}

fn lower(code: u32) -> u32 {
    char::from_u32(code)
        .and_then(|c| c.to_lowercase().next())
        .map(u32::from)
        .unwrap_or(code)
}

impl NearbyKeys {
    /// A key is near another when its centre is within
    /// `1.2 * min(key_width, key_height)` of that key's rectangle.
    pub fn from_layout(layout: &KeyboardLayout) -> Self {
        let threshold = layout.key_width.min(layout.key_height) * 1.2;
        let threshold = threshold * threshold;
        let mut entries: Vec<(u32, Vec<u32>)> = Vec::new();
        for key in layout.keys.iter().filter(|k| !k.is_special()) {
            let near: Vec<u32> = layout
                .keys
                .iter()
                .filter(|other| !other.is_special())
                .filter(|other| {
                    let (cx, cy) = other.center();
                    key.squared_distance_to_edge(cx, cy) < threshold
                })
                .map(|other| lower(other.code))
                .collect();
            let code = lower(key.code);
            match entries.iter_mut().find(|(c, _)| *c == code) {
                Some(entry) => entry.1 = near,
                None => entries.push((code, near)),
            }
        }
        Self { entries }
    }

    pub fn get(&self, code: u32) -> Option<&[u32]> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, near)| near.as_slice())
    }

    /// Every letter on the layout.
    pub fn letters(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
