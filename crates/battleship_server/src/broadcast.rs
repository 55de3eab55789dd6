//! Safe fan-out with per-recipient failure pruning.

use log::warn;

use battleship_common::Payload;

use crate::game::board::Board;
use crate::queue::Queue;

/// Sends `message` (optionally preceded by a rendered `board`) to every
/// target in a point-in-time snapshot of the queue. A `ConnectionLost`
/// on any single send removes that session from the queue and is
/// logged; it never interrupts the rest of the fan-out.
pub async fn broadcast(
    queue: &Queue,
    message: Payload,
    board: Option<(&Board, bool)>,
    spectators_only: bool,
) {
    let snapshot = queue.snapshot().await;
    let targets = if spectators_only {
        snapshot.into_iter().skip(2).collect::<Vec<_>>()
    } else {
        snapshot
    };

    for session in targets {
        let who = session.username().unwrap_or("<anonymous>").to_string();

        if let Some((board, show_ships)) = board {
            let rendered = board.render(show_ships);
            if let Err(e) = session.send(Payload::board(rendered, show_ships)).await {
                warn!("dropping {who} from the queue: board send failed: {e}");
                queue.remove_username(&who).await;
                continue;
            }
        }

        if let Err(e) = session.send(message.clone()).await {
            warn!("dropping {who} from the queue: message send failed: {e}");
            queue.remove_username(&who).await;
        }
    }
}

/// Composes the spectator-facing narration for a turn result and
/// delegates to [`broadcast`] with `spectators_only = true`.
pub async fn notify_spectators(
    queue: &Queue,
    defender_board: &Board,
    attacker: &str,
    result_text: &str,
) {
    let msg = format!("{attacker}: {result_text}");
    broadcast(
        queue,
        Payload::s_msg(msg),
        Some((defender_board, false)),
        true,
    )
    .await;
}

/// Refreshes the spinner text sent to each spectator, reflecting their
/// rank in the queue (position 2 is "next up", etc).
pub async fn refresh_spectator_ranks(queue: &Queue) {
    let snapshot = queue.snapshot().await;
    for (idx, session) in snapshot.iter().enumerate().skip(2) {
        let rank = idx - 1;
        let _ = session
            .send(Payload::waiting(format!(
                "You are spectating. Position in queue: {rank}"
            )))
            .await;
    }
}
