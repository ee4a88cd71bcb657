use crate::{render::ClearPieces, Settings};
use bevy::{input::common_conditions::input_toggle_active, prelude::*};
use bevy_chess_board::placement::PlacementMode;
use bevy_inspector_egui::quick::ResourceInspectorPlugin;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(
            ResourceInspectorPlugin::<Settings>::default()
                .run_if(input_toggle_active(true, KeyCode::F1)),
        )
        .add_systems(Update, shortcuts);
    }
}

fn shortcuts(
    mut settings: ResMut<Settings>,
    mut clear: EventWriter<ClearPieces>,
    keys: Res<ButtonInput<KeyCode>>,
) {
    if keys.just_pressed(KeyCode::KeyP) {
        settings.polling = !settings.polling;
        info!("polling {}", if settings.polling { "resumed" } else { "paused" });
    }

    if keys.just_pressed(KeyCode::KeyM) {
        settings.placement = match settings.placement {
            PlacementMode::Diff => PlacementMode::Accumulate,
            PlacementMode::Accumulate => PlacementMode::Diff,
        };
        info!("placement mode {:?}", settings.placement);
    }

    if keys.just_pressed(KeyCode::KeyC) {
        clear.send(ClearPieces);
    }
}
