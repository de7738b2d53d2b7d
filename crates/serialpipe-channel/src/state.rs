use serde::Serialize;
use serialpipe_frame::FrameQueue;
use serialpipe_transport::LinkState;

/// Snapshot of a send pipeline, recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    /// The worker has not created its queue yet.
    Uninitialized,
    Reset,
    Error,
    /// Every queue slot is taken.
    QueueFull,
    Ready,
}

/// Snapshot of a receive pipeline, recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveState {
    /// The worker has not created its queue yet.
    Uninitialized,
    Reset,
    Error,
    /// No frame is waiting.
    Empty,
    Ready,
}

impl SendState {
    pub(crate) fn derive(queue: Option<&FrameQueue>, link: LinkState) -> Self {
        let Some(queue) = queue else {
            return SendState::Uninitialized;
        };
        match link {
            LinkState::Error => SendState::Error,
            LinkState::Reset => SendState::Reset,
            LinkState::Normal if queue.is_full() => SendState::QueueFull,
            LinkState::Normal => SendState::Ready,
        }
    }
}

impl ReceiveState {
    pub(crate) fn derive(queue: Option<&FrameQueue>, link: LinkState) -> Self {
        let Some(queue) = queue else {
            return ReceiveState::Uninitialized;
        };
        match link {
            LinkState::Error => ReceiveState::Error,
            LinkState::Reset => ReceiveState::Reset,
            LinkState::Normal if queue.is_empty() => ReceiveState::Empty,
            LinkState::Normal => ReceiveState::Ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use serialpipe_frame::{Frame, OnFull};

    use super::*;

    #[test]
    fn missing_queue_is_uninitialized() {
        assert_eq!(
            SendState::derive(None, LinkState::Error),
            SendState::Uninitialized
        );
        assert_eq!(
            ReceiveState::derive(None, LinkState::Normal),
            ReceiveState::Uninitialized
        );
    }

    #[test]
    fn link_state_wins_over_occupancy() {
        let queue = FrameQueue::new(1, OnFull::Block).unwrap();
        queue.push(Frame::text("x"), None).unwrap();

        assert_eq!(
            SendState::derive(Some(&queue), LinkState::Reset),
            SendState::Reset
        );
        assert_eq!(
            ReceiveState::derive(Some(&queue), LinkState::Error),
            ReceiveState::Error
        );
    }

    #[test]
    fn occupancy_states() {
        let queue = FrameQueue::new(1, OnFull::Block).unwrap();
        assert_eq!(
            SendState::derive(Some(&queue), LinkState::Normal),
            SendState::Ready
        );
        assert_eq!(
            ReceiveState::derive(Some(&queue), LinkState::Normal),
            ReceiveState::Empty
        );

        queue.push(Frame::text("x"), None).unwrap();
        assert_eq!(
            SendState::derive(Some(&queue), LinkState::Normal),
            SendState::QueueFull
        );
        assert_eq!(
            ReceiveState::derive(Some(&queue), LinkState::Normal),
            ReceiveState::Ready
        );
    }
}
