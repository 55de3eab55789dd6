//! Per-connection state: identity, the write-half framing, the
//! single-slot input mailbox, and the turn gate. `username`/`connected`
//! are set-once/monotonic and read lock-free, `latest_input`/`my_turn`
//! are a cross-task exchange slot behind a per-session mutex, and the
//! write half is single-owner-per-send behind its own mutex so the
//! handler, the match driver and the broadcaster can all write
//! concurrently without racing each other's frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use battleship_common::{FrameCodec, GameError, GameResult, Payload};
use futures::SinkExt;
use once_cell::sync::OnceCell;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::codec::FramedWrite;

/// Poll interval for [`Session::wait_for_message`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Session {
    username: OnceCell<String>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    latest_input: Mutex<Option<String>>,
    my_turn: AtomicBool,
    connected: AtomicBool,
}

impl Session {
    pub fn new(writer: FramedWrite<OwnedWriteHalf, FrameCodec>) -> Self {
        Session {
            username: OnceCell::new(),
            writer: Mutex::new(writer),
            latest_input: Mutex::new(None),
            my_turn: AtomicBool::new(false),
            connected: AtomicBool::new(true),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.get().map(String::as_str)
    }

    /// Binds the session's identity. Called once, at authentication
    /// success; a second call is a programming error and is ignored.
    pub fn bind_username(&self, name: String) {
        let _ = self.username.set(name);
    }

    pub fn my_turn(&self) -> bool {
        self.my_turn.load(Ordering::SeqCst)
    }

    pub fn set_my_turn(&self, value: bool) {
        self.my_turn.store(value, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, value: bool) {
        self.connected.store(value, Ordering::SeqCst);
    }

    pub async fn send(&self, payload: Payload) -> GameResult<()> {
        let mut writer = self.writer.lock().await;
        writer.send(payload).await
    }

    /// Fills the single-slot mailbox with the next expected command,
    /// unless it is already holding one. The slot holds at most one
    /// value until the consumer clears it by calling
    /// [`Session::wait_for_message`]; a second offer while it is full is
    /// dropped.
    pub async fn offer_input(&self, line: String) {
        let mut slot = self.latest_input.lock().await;
        if slot.is_none() {
            *slot = Some(line);
        }
    }

    /// Polls the mailbox until a value appears or `timeout` elapses.
    /// `timeout: None` waits indefinitely (used during placement).
    pub async fn wait_for_message(&self, timeout: Option<Duration>) -> GameResult<String> {
        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);

        loop {
            if !self.is_connected() {
                return Err(GameError::ConnectionLost(
                    "session disconnected while awaiting input".to_string(),
                ));
            }

            {
                let mut slot = self.latest_input.lock().await;
                if let Some(line) = slot.take() {
                    return Ok(line);
                }
            }

            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Err(GameError::Timeout);
                }
            }

            sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    async fn dummy_session() -> (Session, tokio::net::TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (server_stream, _) = listener.accept().await.unwrap();
        let (_r, w) = server_stream.into_split();
        let key = battleship_common::crypto::derive_key("test");
        let writer = FramedWrite::new(w, FrameCodec::new(key));
        (Session::new(writer), client)
    }

    #[tokio::test]
    async fn wait_for_message_returns_offered_input() {
        let (session, _client) = dummy_session().await;
        let session = Arc::new(session);

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.wait_for_message(None).await })
        };

        tokio::time::sleep(StdDuration::from_millis(10)).await;
        session.offer_input("A1 V".to_string()).await;

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result, "A1 V");
    }

    #[tokio::test]
    async fn second_offer_is_dropped_while_slot_is_full() {
        let (session, _client) = dummy_session().await;

        session.offer_input("A1 V".to_string()).await;
        session.offer_input("B2 H".to_string()).await;

        let result = session
            .wait_for_message(Some(StdDuration::from_millis(60)))
            .await
            .unwrap();
        assert_eq!(result, "A1 V");

        let result = session
            .wait_for_message(Some(StdDuration::from_millis(60)))
            .await;
        assert!(matches!(result, Err(GameError::Timeout)));
    }

    #[tokio::test]
    async fn wait_for_message_times_out() {
        let (session, _client) = dummy_session().await;
        let result = session
            .wait_for_message(Some(StdDuration::from_millis(60)))
            .await;
        assert!(matches!(result, Err(GameError::Timeout)));
    }

    #[tokio::test]
    async fn username_binds_once() {
        let (session, _client) = dummy_session().await;
        session.bind_username("alice".to_string());
        session.bind_username("bob".to_string());
        assert_eq!(session.username(), Some("alice"));
    }
}
