mod config;
mod player;
mod transfer;

use config::AppConfig;
use player::engine::CoordinatorHandle;
use player::locator::AssetLocator;
use tauri::{Manager, WindowEvent};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }

            let config = AppConfig::load().unwrap_or_else(|e| {
                log::warn!("Using default configuration: {}", e);
                AppConfig::default()
            });
            let storage_dir = match config.storage_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    log::warn!("{}, storing downloads in the app data dir", e);
                    app.path().app_data_dir()?
                }
            };
            let locator = AssetLocator::new(config.remote_asset()?, storage_dir);
            // The webview plays the saved copy through the asset protocol.
            app.asset_protocol_scope()
                .allow_directory(locator.storage_dir(), false)?;
            log::info!(
                "Remote asset {} stored at {}",
                locator.remote().url(),
                locator.resolve_local_path().display()
            );

            // Initialize playback coordinator
            let engine = CoordinatorHandle::new(
                app.handle().clone(),
                locator,
                config.transfer_settings(),
            )?;
            app.manage(engine);
            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::CloseRequested { .. } = event {
                if let Some(engine) = window.try_state::<CoordinatorHandle>() {
                    engine.view_hidden();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            player::commands::player_play,
            player::commands::player_download,
            player::commands::player_cancel_download,
            player::commands::player_layout_changed,
            player::commands::player_view_hidden,
            player::commands::player_get_state,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
