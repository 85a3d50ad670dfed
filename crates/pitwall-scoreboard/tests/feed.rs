//! Scoreboard driven by a real timing server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;

use pitwall_client::{ClientConfig, ConnectionManager};
use pitwall_scoreboard::{Board, FeedBridge, LapHighlight, Scoreboard};
use pitwall_settings::{ClientSettings, ScoreboardSettings};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerStream = WebSocketStream<tokio::net::TcpStream>;

async fn boot_server() -> (String, mpsc::UnboundedReceiver<ServerStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    drop(tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(ws) = accept_async(stream).await else {
                continue;
            };
            if tx.send(ws).is_err() {
                break;
            }
        }
    }));
    (format!("ws://{addr}"), rx)
}

fn config(url: &str) -> ClientConfig {
    ClientConfig::from_settings(&ClientSettings {
        url: url.to_owned(),
        sending_interval_ms: 10,
        open_settle_delay_ms: 10,
        reconnection_interval_ms: 50,
        close_retry_delay_ms: 50,
        ..ClientSettings::default()
    })
}

async fn push(ws: &mut ServerStream, identifier: &str, data: Value) {
    let frame = json!({"identifier": identifier, "data": data}).to_string();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

/// Wait for a board satisfying `pred`.
async fn board_where<F>(boards: &mut mpsc::UnboundedReceiver<Board>, pred: F) -> Board
where
    F: Fn(&Board) -> bool,
{
    timeout(TIMEOUT, async {
        loop {
            let board = boards.recv().await.unwrap();
            if pred(&board) {
                return board;
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn snapshot_and_laps_reach_the_board() {
    let (url, mut accepted) = boot_server().await;
    let manager = ConnectionManager::new(config(&url)).unwrap();
    let (bridge, inputs) = FeedBridge::attach(&manager);

    let cancel = CancellationToken::new();
    let (board_tx, mut boards) = mpsc::unbounded_channel();
    let scoreboard = tokio::spawn(Scoreboard::new(&ScoreboardSettings::default()).run(
        inputs,
        cancel.clone(),
        move |board| {
            let _ = board_tx.send(board.clone());
        },
    ));

    manager.start();
    let _ = manager.send("getStatus", json!({}));

    let mut ws = timeout(TIMEOUT, accepted.recv()).await.unwrap().unwrap();
    let request = loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            break serde_json::from_str::<Value>(text.as_str()).unwrap();
        }
    };
    assert_eq!(request["command"], "getStatus");

    push(
        &mut ws,
        "status",
        json!({
            "elapsedTime": 60,
            "timeLeft": 540,
            "active": true,
            "bestLapTime": null,
            "racers": {"101": {"cartId": 4, "name": "", "laps": {}, "bestLap": null, "bestTime": null}}
        }),
    )
    .await;
    let board = board_where(&mut boards, |b| !b.rows.is_empty()).await;
    assert!(board.connected);
    assert!(!board.stub_visible);
    assert_eq!(board.rows[0].name, "Kart #4");

    push(&mut ws, "addDriver", json!({"transponderId": 202, "id": 9, "name": "Robin"})).await;
    push(
        &mut ws,
        "endLap",
        json!({"transponderId": 202, "lapNumber": 1, "time": 43_500, "isImproved": false}),
    )
    .await;
    push(
        &mut ws,
        "endLap",
        json!({"transponderId": "101", "lapNumber": 1, "time": 44_000, "isImproved": false}),
    )
    .await;

    let board = board_where(&mut boards, |b| b.rows.iter().all(|r| r.laps == 1)).await;
    assert_eq!(board.rows[0].name, "Robin");
    assert_eq!(board.rows[0].last_lap.unwrap().highlight, LapHighlight::OverallBest);
    assert_eq!(board.rows[1].gap, Some(500));
    assert_eq!(board.best_overall, Some(43_500));

    // A lap for an unregistered transponder is ignored.
    push(
        &mut ws,
        "endLap",
        json!({"transponderId": 999, "lapNumber": 1, "time": 1_000, "isImproved": true}),
    )
    .await;
    push(&mut ws, "timing", json!({"elapsed": 61, "left": 539})).await;
    let board = board_where(&mut boards, |b| b.clock.elapsed == Some(61)).await;
    assert_eq!(board.best_overall, Some(43_500));

    bridge.detach(&manager);
    cancel.cancel();
    let scoreboard = scoreboard.await.unwrap();
    assert_eq!(scoreboard.state().drivers().count(), 2);
}

#[tokio::test]
async fn dropped_feed_raises_stub() {
    let (url, mut accepted) = boot_server().await;
    let manager = ConnectionManager::new(config(&url)).unwrap();
    let (_bridge, inputs) = FeedBridge::attach(&manager);

    let cancel = CancellationToken::new();
    let (board_tx, mut boards) = mpsc::unbounded_channel();
    drop(tokio::spawn(Scoreboard::new(&ScoreboardSettings::default()).run(
        inputs,
        cancel.clone(),
        move |board| {
            let _ = board_tx.send(board.clone());
        },
    )));

    manager.start();
    let mut ws = timeout(TIMEOUT, accepted.recv()).await.unwrap().unwrap();
    push(&mut ws, "start", Value::Null).await;
    let _ = board_where(&mut boards, |b| b.connected && !b.stub_visible).await;

    drop(ws);
    let board = board_where(&mut boards, |b| !b.connected).await;
    assert!(board.stub_visible);

    cancel.cancel();
}
