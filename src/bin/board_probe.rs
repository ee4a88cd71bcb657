use bevy_chess_board::{
    board::BoardSnapshot,
    sync::{acknowledge, fetch_board, SyncSettings},
};
use log::{error, info};
use reqwest::Client;
use std::{error::Error, process::ExitCode};

/// Fetches the board once, prints it, and with `--ack` echoes it back.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    colog::init();

    match probe().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn probe() -> Result<(), Box<dyn Error>> {
    let mut settings = SyncSettings::default();
    if let Ok(host) = std::env::var("CHESS_HOST") {
        settings.host = host;
    }
    if let Ok(port) = std::env::var("CHESS_PORT") {
        settings.port = port.parse()?;
    }
    let send_ack = std::env::args().skip(1).any(|arg| arg == "--ack");

    let client = Client::builder().build()?;
    let body = fetch_board(&client, &settings.move_url()).await?;
    let snapshot = BoardSnapshot::from_json(&body)?;

    info!(
        "{} channels, {} pieces",
        snapshot.channels(),
        snapshot.pieces().count()
    );
    println!("{}", snapshot);

    if send_ack {
        acknowledge(&client, &settings.ack_url(), body).await?;
        info!("acknowledged");
    }

    Ok(())
}
