//! Camera connection state
//!
//! One state value per managed camera, written only by the supervisor task
//! and observed by every consumer through a cheap cloneable view. Consumers
//! use it to decide when to stop draining their queues; they never write it.

use tokio::sync::watch;

/// Lifecycle state of the managed camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No device; discovery attempts with bounded backoff
    Searching,
    /// Device opened, stream not yet started
    Connected,
    /// Stream running; consumers drain frames
    Streaming,
    /// Stopping the stream and closing the device handle
    Disconnecting,
}

impl ConnectionState {
    /// Whether moving to `next` is a legal transition.
    ///
    /// The legal edges form the supervision loop
    /// `Searching -> Connected -> Streaming -> Disconnecting -> Searching`,
    /// plus `Connected -> Searching` when stream start fails.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Searching, Connected)
                | (Connected, Streaming)
                | (Connected, Searching)
                | (Streaming, Disconnecting)
                | (Disconnecting, Searching)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Searching => "searching",
            ConnectionState::Connected => "connected",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

/// Single-writer holder of the connection state.
///
/// Owned by the camera supervisor; rejects transitions not enumerated in
/// [`ConnectionState::can_transition_to`].
pub struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    /// Create a cell starting in `Searching`.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Searching);
        Self { tx }
    }

    /// Current state
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Apply a transition, rejecting illegal edges.
    pub fn set(&self, next: ConnectionState) -> crate::Result<()> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(crate::Error::InvalidTransition { from, to: next });
        }
        self.tx.send_replace(next);
        tracing::debug!(from = %from, to = %next, "Connection state changed");
        Ok(())
    }

    /// Read-only view for consumers.
    pub fn view(&self) -> StateView {
        StateView {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the connection state, cloneable per consumer task.
#[derive(Clone)]
pub struct StateView {
    rx: watch::Receiver<ConnectionState>,
}

impl StateView {
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    pub fn is_streaming(&self) -> bool {
        self.current() == ConnectionState::Streaming
    }

    /// Wait until the camera is streaming.
    ///
    /// Returns `false` if the supervisor is gone (state channel closed),
    /// which consumers treat as shutdown.
    pub async fn wait_for_streaming(&mut self) -> bool {
        self.rx
            .wait_for(|s| *s == ConnectionState::Streaming)
            .await
            .is_ok()
    }

    /// Wait for the next state change; `None` means the supervisor is gone.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        match self.rx.changed().await {
            Ok(()) => Some(*self.rx.borrow()),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn supervision_loop_edges_are_legal() {
        assert!(Searching.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Streaming));
        assert!(Connected.can_transition_to(Searching));
        assert!(Streaming.can_transition_to(Disconnecting));
        assert!(Disconnecting.can_transition_to(Searching));
    }

    #[test]
    fn shortcut_edges_are_illegal() {
        assert!(!Streaming.can_transition_to(Connected));
        assert!(!Streaming.can_transition_to(Searching));
        assert!(!Searching.can_transition_to(Streaming));
        assert!(!Disconnecting.can_transition_to(Streaming));
        assert!(!Connected.can_transition_to(Disconnecting));
        // No self-loops
        assert!(!Searching.can_transition_to(Searching));
        assert!(!Streaming.can_transition_to(Streaming));
    }

    #[test]
    fn cell_rejects_illegal_transition() {
        let cell = StateCell::new();
        assert_eq!(cell.current(), Searching);

        cell.set(Connected).unwrap();
        cell.set(Streaming).unwrap();

        let err = cell.set(Connected).unwrap_err();
        match err {
            crate::Error::InvalidTransition { from, to } => {
                assert_eq!(from, Streaming);
                assert_eq!(to, Connected);
            }
            other => panic!("unexpected error: {}", other),
        }
        // State unchanged after the rejected transition
        assert_eq!(cell.current(), Streaming);
    }

    #[tokio::test]
    async fn view_observes_writer_transitions() {
        let cell = StateCell::new();
        let mut view = cell.view();
        assert!(!view.is_streaming());

        cell.set(Connected).unwrap();
        assert_eq!(view.changed().await, Some(Connected));

        cell.set(Streaming).unwrap();
        assert!(view.wait_for_streaming().await);
        assert!(view.is_streaming());
    }
}
