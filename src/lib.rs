pub mod api;
pub mod db;
pub mod session;
pub mod voice;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(test)]
mod testing;

pub use api::{ApiError, BackendGateway, HttpGateway};
pub use db::{ClientSettings, Database};
pub use session::{ChatClient, ChatContext, Confirm, SessionSnapshot};
pub use voice::{VoiceHandle, VoiceState};

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::{AppState, DialogConfirm};
    use std::sync::Arc;
    use tauri::{Emitter, Manager};

    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(log::LevelFilter::Debug)
                .build(),
        )
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let database = Database::open(&app_dir)?;
            let settings = database.load_settings()?;
            log::info!("[setup] backend at {}", settings.api_base_url);

            let gateway = Arc::new(HttpGateway::from_settings(&settings)?);
            let confirm = Arc::new(DialogConfirm::new(app.handle().clone()));
            let client = ChatClient::new(&settings, gateway, confirm);

            let handle = app.handle().clone();
            let mut session_updates = client.context().subscribe();
            tauri::async_runtime::spawn(async move {
                while session_updates.changed().await.is_ok() {
                    let snapshot = session_updates.borrow_and_update().clone();
                    if let Err(e) = handle.emit("session-updated", snapshot) {
                        log::warn!("[setup] emit session-updated failed: {}", e);
                    }
                }
            });

            app.manage(database);
            app.manage(AppState {
                client,
                speech_language: settings.speech_language.clone(),
                voice: Default::default(),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::documents::upload_document,
            commands::documents::remove_document,
            commands::documents::refresh_document,
            commands::chat::send_question,
            commands::chat::set_input,
            commands::chat::input_key,
            commands::chat::clear_conversation,
            commands::chat::load_history,
            commands::chat::session_snapshot,
            commands::voice::voice_capability,
            commands::voice::voice_start,
            commands::voice::voice_stop,
            commands::voice::voice_reset,
            commands::voice::voice_engine_event,
            commands::voice::voice_permission,
            commands::settings::get_settings,
            commands::settings::set_setting,
            commands::settings::delete_setting,
        ])
        .run(tauri::generate_context!())
        .unwrap_or_else(|e| log::error!("error while running tauri application: {}", e));
}
