use bevy::prelude::*;
use bevy_chess_board::{
    placement::{BoardLayout, PlacementMode},
    sync::SyncSettings,
};
use render::PieceSlots;
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;

mod render;
mod ui;
mod web;

const SETTINGS_PATH: &str = "chess.json";

#[derive(Resource, Reflect, Clone, Serialize, Deserialize)]
#[reflect(Resource)]
#[serde(default)]
pub struct Settings {
    pub polling: bool,
    pub sync: SyncSettings,
    pub layout: BoardLayout,
    pub placement: PlacementMode,
    pub pieces: PieceSlots,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            polling: true,
            sync: SyncSettings::default(),
            layout: BoardLayout::default(),
            placement: PlacementMode::default(),
            pieces: PieceSlots::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl Settings {
    /// `Ok(None)` when there is no settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}

/// Loads [`Settings`] once logging is up.
pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        let path = std::env::var("CHESS_SETTINGS").unwrap_or_else(|_| SETTINGS_PATH.to_string());

        let settings = match Settings::load(&path) {
            Ok(Some(settings)) => {
                info!("loaded settings from {}", path);
                settings
            }
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("{} ({}), using defaults", e, path);
                Settings::default()
            }
        };

        app.register_type::<Settings>().insert_resource(settings);
    }
}

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Chess".to_string(),
                    canvas: Some("#bevy".to_string()),
                    prevent_default_event_handling: false,
                    ..default()
                }),
                ..default()
            }),
            SettingsPlugin,
            ui::UiPlugin,
            web::WebPlugin,
            render::BoardRenderPlugin,
        ))
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.1)))
        .run();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_chess_board::board::PieceKind;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "sync": { "host": "192.168.1.20" },
                "layout": { "x": -350.0 },
                "placement": "Diff",
                "pieces": { "white": { "pawn": "pieces.glb#Mesh0/Primitive0" } }
            }"#,
        )
        .unwrap();

        assert!(settings.polling);
        assert_eq!(settings.sync.move_url(), "http://192.168.1.20:8000/move");
        assert_eq!(settings.layout, BoardLayout::new(-350.0, 0.0));
        assert_eq!(settings.placement, PlacementMode::Diff);
        assert_eq!(
            settings.pieces.white.get(PieceKind::Pawn),
            Some("pieces.glb#Mesh0/Primitive0")
        );
        assert_eq!(settings.pieces.black.get(PieceKind::Pawn), None);
    }

    #[test]
    fn pieces_accumulate_by_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.placement, PlacementMode::Accumulate);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        assert!(matches!(
            Settings::load("does/not/exist/chess.json"),
            Ok(None)
        ));
    }
}
