use super::AppState;
use crate::db::models::Document;
use crate::session::DocumentError;
use std::path::PathBuf;
use tauri::State;

#[tauri::command]
pub async fn upload_document(
    state: State<'_, AppState>,
    file_path: String,
) -> Result<Document, DocumentError> {
    let path = PathBuf::from(file_path);
    state.client.documents().upload_path(&path).await
}

#[tauri::command]
pub async fn remove_document(state: State<'_, AppState>) -> Result<bool, DocumentError> {
    state.client.documents().remove().await
}

#[tauri::command]
pub async fn refresh_document(state: State<'_, AppState>) -> Result<Document, DocumentError> {
    state.client.documents().refresh_status().await
}
