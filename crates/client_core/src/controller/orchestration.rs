//! Intent queue between a UI front end and the session controller.

use std::sync::Arc;

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinSet,
};
use tracing::{debug, warn};

use crate::controller::{events::UiIntent, session::SessionController};

pub const INTENT_QUEUE_CAPACITY: usize = 256;

pub fn dispatch_intent(intent_tx: &mpsc::Sender<UiIntent>, intent: UiIntent, status: &mut String) {
    let intent_name = intent.name();

    match intent_tx.try_send(intent) {
        Ok(()) => debug!(intent = intent_name, "queued ui intent"),
        Err(TrySendError::Full(_)) => {
            *status = "UI intent queue is full; please retry".to_string();
        }
        Err(TrySendError::Closed(_)) => {
            *status = "Session controller stopped; restart the client".to_string();
        }
    }
}

/// Runs every received intent as its own task so a slow request never blocks
/// later intents. Returns after the queue closes and all handlers finished.
pub async fn run_intent_loop(
    controller: Arc<SessionController>,
    mut intents: mpsc::Receiver<UiIntent>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            intent = intents.recv() => {
                let Some(intent) = intent else {
                    break;
                };
                let controller = Arc::clone(&controller);
                handlers.spawn(async move { controller.handle_intent(intent).await });
            }
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(err) = joined {
                    warn!(error = %err, "intent handler task aborted");
                }
            }
        }
    }

    while let Some(joined) = handlers.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "intent handler task aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_full_queue_in_status() {
        let (tx, _rx) = mpsc::channel(1);
        let mut status = String::new();

        dispatch_intent(&tx, UiIntent::RefreshStats, &mut status);
        assert!(status.is_empty());

        dispatch_intent(&tx, UiIntent::RefreshStats, &mut status);
        assert_eq!(status, "UI intent queue is full; please retry");
    }

    #[test]
    fn reports_stopped_controller_in_status() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut status = String::new();

        dispatch_intent(&tx, UiIntent::SavePrompt, &mut status);
        assert_eq!(status, "Session controller stopped; restart the client");
    }
}
