use crate::{Dom, Error};

///
/// A single user-adjustable integer preference persisted in browser
/// storage, clamped to a closed range.
///
#[derive(Clone, Copy, Debug)]
pub struct Preference {
    pub key: &'static str,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

/// Per-step font-size offset for chord names, carried across page loads.
pub const CHORD_FONT_OFFSET: Preference = Preference {
    key: "ug-chords-fontsize",
    min: -3,
    max: 6,
    default: 0,
};

impl Preference {
    fn clamp(&self, value: i32) -> i32 {
        value.max(self.min).min(self.max)
    }

    /// Stored value, clamped; the default when absent or unparseable.
    pub fn load<D: Dom>(&self, dom: &D) -> i32 {
        let value = dom
            .read_storage(self.key)
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .unwrap_or(self.default);
        self.clamp(value)
    }

    pub fn save<D: Dom>(&self, dom: &D, value: i32) -> Result<i32, Error> {
        let value = self.clamp(value);
        dom.write_storage(self.key, &value.to_string())?;
        Ok(value)
    }

    /// Load, add `delta`, clamp, store, and return the new value.
    pub fn adjust<D: Dom>(&self, dom: &D, delta: i32) -> Result<i32, Error> {
        self.save(dom, self.load(dom) + delta)
    }
}
