use crate::Settings;
use bevy::prelude::*;
use bevy_chess_board::{board::BoardSnapshot, sync::BoardSync};
use std::time::Duration;

/// Poll interval bounds, whatever the settings ask for.
const MIN_POLL_SECS: f32 = 0.05;
const MAX_POLL_SECS: f32 = 3600.0;

pub struct WebPlugin;

impl Plugin for WebPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<BoardReceived>()
            .insert_resource(PollTimer(Timer::from_seconds(1.0, TimerMode::Repeating)))
            .add_systems(Startup, connect)
            .add_systems(Update, (request_board, receive_board).chain());
    }
}

/// A board that came in from the server and decoded.
#[derive(Event)]
pub struct BoardReceived(pub BoardSnapshot);

#[derive(Resource, Deref, DerefMut)]
pub struct PollTimer(Timer);

#[derive(Resource, Deref, DerefMut)]
pub struct WebSync(BoardSync);

fn connect(mut commands: Commands, settings: Res<Settings>) {
    match BoardSync::connect(&settings.sync) {
        Ok(sync) => {
            info!("board sync started for {}", settings.sync.move_url());
            commands.insert_resource(WebSync(sync));
        }
        Err(e) => error!("could not start board sync: {}", e),
    }
}

fn request_board(
    sync: Option<ResMut<WebSync>>,
    mut timer: ResMut<PollTimer>,
    mut worker_gone: Local<bool>,
    time: Res<Time>,
    settings: Res<Settings>,
) {
    let Some(mut sync) = sync else {
        return;
    };

    if !settings.polling {
        timer.reset();
        return;
    }

    timer.set_duration(poll_interval(settings.sync.poll_interval_secs));
    timer.tick(time.delta());

    if timer.just_finished() {
        match sync.tick() {
            Ok(()) => *worker_gone = false,
            Err(e) if !*worker_gone => {
                error!("board request failed: {}", e);
                *worker_gone = true;
            }
            Err(_) => {}
        }
    }
}

fn poll_interval(secs: f32) -> Duration {
    // NaN ends up at the lower bound
    Duration::from_secs_f32(secs.max(MIN_POLL_SECS).min(MAX_POLL_SECS))
}

fn receive_board(sync: Option<ResMut<WebSync>>, mut boards: EventWriter<BoardReceived>) {
    let Some(mut sync) = sync else {
        return;
    };

    for snapshot in sync.poll() {
        debug!("received board update with {} channels", snapshot.channels());
        boards.send(BoardReceived(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_chess_board::sync::{SyncCommand, SyncUpdate};
    use crossbeam::channel::unbounded;
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Resource, Default)]
    struct Received(Vec<BoardSnapshot>);

    fn collect(mut boards: EventReader<BoardReceived>, mut received: ResMut<Received>) {
        received
            .0
            .extend(boards.read().map(|BoardReceived(snapshot)| snapshot.clone()));
    }

    #[test]
    fn poll_interval_stays_in_bounds() {
        assert_eq!(poll_interval(1.0), Duration::from_secs(1));
        assert_eq!(poll_interval(0.0), Duration::from_secs_f32(MIN_POLL_SECS));
        assert_eq!(poll_interval(-3.0), Duration::from_secs_f32(MIN_POLL_SECS));
        assert_eq!(poll_interval(f32::NAN), Duration::from_secs_f32(MIN_POLL_SECS));
        assert_eq!(poll_interval(f32::INFINITY), Duration::from_secs(3600));
        assert_eq!(poll_interval(f32::MAX), Duration::from_secs(3600));
    }

    #[test]
    fn canned_responses_become_events() {
        let (commands_tx, _commands_rx) = unbounded_channel::<SyncCommand>();
        let (updates_tx, updates_rx) = unbounded();

        let mut app = App::new();
        app.add_event::<BoardReceived>()
            .init_resource::<Received>()
            .insert_resource(WebSync(BoardSync::new(commands_tx, updates_rx)))
            .add_systems(Update, (receive_board, collect).chain());

        updates_tx
            .send(SyncUpdate::Board {
                body: "[[[0, 6]]]".to_string(),
            })
            .unwrap();
        updates_tx
            .send(SyncUpdate::Board {
                body: "garbage".to_string(),
            })
            .unwrap();
        app.update();

        let received = &app.world().resource::<Received>().0;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].pieces().count(), 1);
        assert_eq!(
            app.world().resource::<WebSync>().last_payload(),
            Some("garbage")
        );
    }
}
