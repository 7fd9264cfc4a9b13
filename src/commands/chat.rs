use super::AppState;
use crate::session::{ChatError, InputKey, SessionSnapshot};
use tauri::State;

#[tauri::command]
pub async fn send_question(
    state: State<'_, AppState>,
    question: String,
) -> Result<(), ChatError> {
    state.client.conversation().send_question(&question).await
}

#[tauri::command]
pub fn set_input(state: State<'_, AppState>, text: String) {
    state.client.conversation().set_input(text);
}

#[tauri::command]
pub async fn input_key(state: State<'_, AppState>, key: InputKey) -> Result<(), ChatError> {
    state.client.conversation().handle_key(key).await
}

#[tauri::command]
pub async fn clear_conversation(state: State<'_, AppState>) -> Result<bool, ChatError> {
    Ok(state.client.conversation().clear().await)
}

#[tauri::command]
pub async fn load_history(
    state: State<'_, AppState>,
    conversation_id: String,
) -> Result<SessionSnapshot, ChatError> {
    state
        .client
        .conversation()
        .load_history(&conversation_id)
        .await;
    Ok(state.client.context().snapshot())
}

#[tauri::command]
pub fn session_snapshot(state: State<'_, AppState>) -> SessionSnapshot {
    state.client.context().snapshot()
}
