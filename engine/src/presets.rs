use indexmap::IndexMap;

use crate::sheet::CharacterSheet;

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("unknown preset '{0}'")]
    Unknown(String),
    #[error("built-in preset '{name}' is malformed: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn builtin_presets() -> IndexMap<&'static str, &'static str> {
    IndexMap::from([
        ("fighter", include_str!("../content/presets/fighter.json")),
        ("rogue", include_str!("../content/presets/rogue.json")),
        ("barbarian", include_str!("../content/presets/barbarian.json")),
        ("monk", include_str!("../content/presets/monk.json")),
    ])
}

/// Look up a built-in preset by case-insensitive name.
pub fn preset(name: &str) -> Result<CharacterSheet, PresetError> {
    let key = name.to_lowercase();
    let presets = builtin_presets();
    let json = presets
        .get(key.as_str())
        .ok_or_else(|| PresetError::Unknown(name.to_string()))?;
    serde_json::from_str(json).map_err(|source| PresetError::Malformed { name: key, source })
}

pub fn preset_names() -> Vec<&'static str> {
    builtin_presets().keys().copied().collect()
}
