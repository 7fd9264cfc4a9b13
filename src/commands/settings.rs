use crate::db::{Database, SettingsError, SETTING_KEYS};
use std::collections::HashMap;
use tauri::State;

/// Stored values only; unset keys fall back to defaults on next launch.
#[tauri::command]
pub fn get_settings(db: State<'_, Database>) -> Result<HashMap<String, String>, SettingsError> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key)? {
            map.insert(key.to_string(), value);
        }
    }
    Ok(map)
}

#[tauri::command]
pub fn set_setting(db: State<'_, Database>, key: String, value: String) -> Result<(), SettingsError> {
    db.set_setting(&key, &value)
}

#[tauri::command]
pub fn delete_setting(db: State<'_, Database>, key: String) -> Result<(), SettingsError> {
    db.delete_setting(&key)
}
