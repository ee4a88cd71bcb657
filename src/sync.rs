use crate::board::BoardSnapshot;
use bevy::reflect::Reflect;
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{io, thread};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub host: String,
    pub port: u16,
    pub move_path: String,
    pub ack_path: String,
    pub poll_interval_secs: f32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            move_path: "/move".to_string(),
            ack_path: "/ack".to_string(),
            poll_interval_secs: 1.0,
        }
    }
}

impl SyncSettings {
    pub fn move_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.move_path)
    }

    pub fn ack_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.ack_path)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered with {0}")]
    Status(StatusCode),
    #[error("sync worker is gone")]
    WorkerGone,
}

/// Sent from the game loop to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    FetchBoard,
    Acknowledge { body: String },
}

/// Sent from the worker back to the game loop.
#[derive(Debug)]
pub enum SyncUpdate {
    Board { body: String },
    Failed { error: SyncError },
    Acknowledged,
    AckFailed { error: SyncError },
}

/// Game loop side of the board sync.
///
/// [`BoardSync::tick`] asks for a fresh board and echoes the last received
/// body back to the server, [`BoardSync::poll`] collects whatever the worker
/// has answered since. Nothing here blocks.
pub struct BoardSync {
    commands: UnboundedSender<SyncCommand>,
    updates: Receiver<SyncUpdate>,
    last_payload: Option<String>,
}

impl BoardSync {
    pub fn new(commands: UnboundedSender<SyncCommand>, updates: Receiver<SyncUpdate>) -> Self {
        Self {
            commands,
            updates,
            last_payload: None,
        }
    }

    /// Starts a [`SyncWorker`] for `settings` and connects to it.
    pub fn connect(settings: &SyncSettings) -> io::Result<Self> {
        let (commands_tx, commands_rx) = unbounded_channel();
        let (updates_tx, updates_rx) = unbounded();

        SyncWorker::new(settings, commands_rx, updates_tx).spawn()?;

        Ok(Self::new(commands_tx, updates_rx))
    }

    /// The raw text of the most recent `/move` response.
    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }

    pub fn tick(&mut self) -> Result<(), SyncError> {
        self.send(SyncCommand::FetchBoard)?;

        if let Some(body) = &self.last_payload {
            self.send(SyncCommand::Acknowledge { body: body.clone() })?;
        }

        Ok(())
    }

    /// Drains the worker's answers and returns the boards that decoded,
    /// oldest first. Failures are logged and skipped.
    pub fn poll(&mut self) -> Vec<BoardSnapshot> {
        let mut snapshots = Vec::new();

        while let Ok(update) = self.updates.try_recv() {
            match update {
                SyncUpdate::Board { body } => {
                    let decoded = BoardSnapshot::from_json(&body);
                    // kept even when it does not decode, the ack echoes it as is
                    self.last_payload = Some(body);
                    match decoded {
                        Ok(snapshot) => {
                            debug!("received board with {} channels", snapshot.channels());
                            snapshots.push(snapshot);
                        }
                        Err(e) => error!("failed to decode board: {}", e),
                    }
                }
                SyncUpdate::Failed { error } => {
                    error!("failed to get board data: {}", error);
                }
                SyncUpdate::Acknowledged => {
                    debug!("board acknowledged");
                }
                SyncUpdate::AckFailed { error } => {
                    warn!("failed to acknowledge board: {}", error);
                }
            }
        }

        snapshots
    }

    fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::WorkerGone)
    }
}

/// Network side of the board sync: a thread with its own tokio runtime that
/// runs every command as a separate task, so slow requests overlap instead
/// of queueing.
pub struct SyncWorker {
    move_url: String,
    ack_url: String,
    commands: UnboundedReceiver<SyncCommand>,
    updates: Sender<SyncUpdate>,
}

impl SyncWorker {
    pub fn new(
        settings: &SyncSettings,
        commands: UnboundedReceiver<SyncCommand>,
        updates: Sender<SyncUpdate>,
    ) -> Self {
        Self {
            move_url: settings.move_url(),
            ack_url: settings.ack_url(),
            commands,
            updates,
        }
    }

    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("board-sync".to_string())
            .spawn(move || self.run())
    }

    /// Runs until every [`BoardSync`] holding the command sender is dropped.
    pub fn run(self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("could not start sync runtime: {}", e);
                return;
            }
        };

        let client = match Client::builder().build() {
            Ok(client) => client,
            Err(e) => {
                error!("could not build http client: {}", e);
                return;
            }
        };

        let Self {
            move_url,
            ack_url,
            mut commands,
            updates,
        } = self;

        info!("polling {} and acknowledging to {}", move_url, ack_url);

        runtime.block_on(async move {
            while let Some(command) = commands.recv().await {
                let client = client.clone();
                let updates = updates.clone();
                let move_url = move_url.clone();
                let ack_url = ack_url.clone();

                tokio::spawn(async move {
                    let update = match command {
                        SyncCommand::FetchBoard => match fetch_board(&client, &move_url).await {
                            Ok(body) => SyncUpdate::Board { body },
                            Err(error) => SyncUpdate::Failed { error },
                        },
                        SyncCommand::Acknowledge { body } => {
                            match acknowledge(&client, &ack_url, body).await {
                                Ok(()) => SyncUpdate::Acknowledged,
                                Err(error) => SyncUpdate::AckFailed { error },
                            }
                        }
                    };

                    // the game loop may already be gone
                    updates.send(update).ok();
                });
            }
        });

        info!("sync worker stopped");
    }
}

pub async fn fetch_board(client: &Client, url: &str) -> Result<String, SyncError> {
    let response = client
        .get(url)
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await?;

    // error pages are passed on like any other body
    let status = response.status();
    if !status.is_success() {
        warn!("{} answered with {}", url, status);
    }

    Ok(response.text().await?)
}

pub async fn acknowledge(client: &Client, url: &str, body: String) -> Result<(), SyncError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Status(status));
    }

    Ok(())
}
