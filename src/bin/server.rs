use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use bevy_chess_board::board::{Piece, PieceColor, PieceKind};
use log::{error, info, warn};
use rand::{seq::IndexedRandom, Rng};
use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};
use tokio::{sync::Mutex, time::interval};

const SIZE: usize = 8;
const MOVE_EVERY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    colog::init();

    let port = std::env::var("CHESS_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(8000u16);

    let state = Data::new(Mutex::new(ServerBoard::new()));

    // start the web server
    let web = match serve(state.clone(), ("0.0.0.0", port)) {
        Ok((server, addrs)) => {
            info!("serving board on {:?}", addrs);
            tokio::spawn(server)
        }
        Err(e) => {
            error!("could not bind port {}: {}", port, e);
            return;
        }
    };

    // start the game
    let game = tokio::spawn(game_loop(state));

    // exit if either the web server or game loop exits
    tokio::select! {
        _ = web => { error!("web server exited"); }
        _ = game => { error!("game loop exited"); }
    }
}

/// Binds the board routes; the returned server only runs once polled.
fn serve(
    state: Data<Mutex<ServerBoard>>,
    addr: impl ToSocketAddrs,
) -> io::Result<(Server, Vec<SocketAddr>)> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .service(web::resource("/move").route(web::get().to(board)))
            .service(web::resource("/ack").route(web::post().to(ack)))
    })
    .bind(addr)?;

    let addrs = server.addrs();
    Ok((server.run(), addrs))
}

async fn game_loop(state: Data<Mutex<ServerBoard>>) {
    let mut interval = interval(MOVE_EVERY);
    // the first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        let mut board = state.lock().await;
        let advanced = board.advance(&mut rand::rng());
        match advanced {
            Some((from, to)) => info!("{:?} pawn {:?} -> {:?}", board.to_move.opposite(), from, to),
            None => {
                info!("no pawn can move, resetting board");
                *board = ServerBoard::new();
            }
        }
    }
}

/// The board the server hands out, advanced by pushing random pawns.
struct ServerBoard {
    cells: [[i32; SIZE]; SIZE],
    to_move: PieceColor,
    acks: usize,
}

impl ServerBoard {
    fn new() -> Self {
        use PieceKind::*;
        let back = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

        let mut cells = [[0; SIZE]; SIZE];
        for col in 0..SIZE {
            cells[0][col] = Piece::new(back[col], PieceColor::Black).code().0;
            cells[1][col] = Piece::new(Pawn, PieceColor::Black).code().0;
            cells[SIZE - 2][col] = Piece::new(Pawn, PieceColor::White).code().0;
            cells[SIZE - 1][col] = Piece::new(back[col], PieceColor::White).code().0;
        }

        Self {
            cells,
            to_move: PieceColor::White,
            acks: 0,
        }
    }

    /// `[channel][row][col]`: piece codes, then a plane that is all ones when
    /// white is to move.
    fn channels(&self) -> Vec<Vec<Vec<i32>>> {
        let side = match self.to_move {
            PieceColor::White => 1,
            PieceColor::Black => 0,
        };
        vec![
            self.cells.iter().map(|row| row.to_vec()).collect(),
            vec![vec![side; SIZE]; SIZE],
        ]
    }

    fn json(&self) -> String {
        serde_json::to_string(&self.channels()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Moves one pawn of the side to move a single step forward.
    fn advance(&mut self, rng: &mut impl Rng) -> Option<((usize, usize), (usize, usize))> {
        let pawn = Piece::new(PieceKind::Pawn, self.to_move).code().0;

        let mut candidates = Vec::new();
        for row in 0..SIZE {
            for col in 0..SIZE {
                if self.cells[row][col] != pawn {
                    continue;
                }
                let next = match self.to_move {
                    PieceColor::White => row.checked_sub(1),
                    PieceColor::Black => Some(row + 1).filter(|&next| next < SIZE),
                };
                if let Some(next) = next.filter(|&next| self.cells[next][col] == 0) {
                    candidates.push(((row, col), (next, col)));
                }
            }
        }

        let &(from, to) = candidates.choose(rng)?;
        self.cells[to.0][to.1] = self.cells[from.0][from.1];
        self.cells[from.0][from.1] = 0;
        self.to_move = self.to_move.opposite();

        Some((from, to))
    }
}

async fn board(state: Data<Mutex<ServerBoard>>) -> HttpResponse {
    let body = state.lock().await.json();
    HttpResponse::Ok()
        .content_type("application/json")
        .body(body)
}

async fn ack(body: String, state: Data<Mutex<ServerBoard>>) -> HttpResponse {
    let mut board = state.lock().await;
    board.acks += 1;

    if body == board.json() {
        info!("ack #{}: client is up to date", board.acks);
    } else {
        warn!("ack #{}: client acknowledged a stale board ({} bytes)", board.acks, body.len());
    }

    HttpResponse::Ok().finish()
}
