use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use super::key::RawKey;

/// Non-blocking check of the focused window's input.
pub trait FocusSource: Send {
    fn poll_key(&mut self) -> Option<RawKey>;
}

/// Focus source fed through a channel. Whatever owns the window (or a
/// signal handler) holds the sender.
pub struct ChannelFocus {
    keys: Receiver<RawKey>,
    closed: bool,
}

impl ChannelFocus {
    pub fn channel() -> (Sender<RawKey>, Self) {
        let (tx, rx) = mpsc::channel();
        (
            tx,
            Self {
                keys: rx,
                closed: false,
            },
        )
    }
}

impl FocusSource for ChannelFocus {
    fn poll_key(&mut self) -> Option<RawKey> {
        match self.keys.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    log::debug!("focus key channel closed");
                    self.closed = true;
                }
                None
            }
        }
    }
}

/// Focus source with no window attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFocus;

impl FocusSource for NoFocus {
    fn poll_key(&mut self) -> Option<RawKey> {
        None
    }
}
