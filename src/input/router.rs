use super::focus::FocusSource;
use super::key::KeyEvent;
use super::mailbox::Mailbox;

/// Merges the background mailbox and the focus-scoped source into one
/// stream of command keys.
pub struct InputRouter {
    mailbox: Mailbox,
    focus: Box<dyn FocusSource>,
}

impl InputRouter {
    pub fn new(mailbox: Mailbox, focus: Box<dyn FocusSource>) -> Self {
        Self { mailbox, focus }
    }

    /// Handle for background producers.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Next key, without waiting. The mailbox wins when both sources have
    /// one; the focus key is then dropped for this cycle.
    pub fn poll(&mut self) -> Option<KeyEvent> {
        let pending = self.mailbox.take();
        let focused = self.focus.poll_key().and_then(KeyEvent::normalize);
        match (pending, focused) {
            (Some(event), Some(dropped)) => {
                log::debug!("focus key {:?} discarded; mailbox holds {:?}", dropped, event);
                Some(event)
            }
            (Some(event), None) => Some(event),
            (None, focused) => focused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ChannelFocus, NoFocus, RawKey};
    use std::sync::mpsc;

    #[test]
    fn mailbox_wins_when_both_pending() {
        let (tx, focus) = ChannelFocus::channel();
        let mut router = InputRouter::new(Mailbox::new(), Box::new(focus));

        tx.send(RawKey::Char('x')).unwrap();
        router.mailbox().post(KeyEvent::Char('g'));

        assert_eq!(router.poll(), Some(KeyEvent::Char('g')));
        assert_eq!(router.poll(), None);
    }

    #[test]
    fn focus_key_then_late_mailbox_key() {
        let (tx, focus) = ChannelFocus::channel();
        let mut router = InputRouter::new(Mailbox::new(), Box::new(focus));

        tx.send(RawKey::Escape).unwrap();
        assert_eq!(router.poll(), Some(KeyEvent::Quit));

        router.mailbox().post(KeyEvent::Space);
        assert_eq!(router.poll(), Some(KeyEvent::Space));
        assert_eq!(router.poll(), None);
    }

    #[test]
    fn empty_sources_poll_none() {
        let mut router = InputRouter::new(Mailbox::new(), Box::new(NoFocus));
        assert_eq!(router.poll(), None);
    }

    #[test]
    fn concurrent_posts_are_consumed_once_each() {
        let mut router = InputRouter::new(Mailbox::new(), Box::new(NoFocus));
        let producer = router.mailbox().clone();
        let (ack_tx, ack_rx) = mpsc::channel::<()>();
        let keys: Vec<char> = ('a'..='z').collect();
        let sent = keys.clone();

        let thread = std::thread::spawn(move || {
            for c in sent {
                producer.post(KeyEvent::Char(c));
                ack_rx.recv().unwrap();
            }
        });

        let mut seen = Vec::new();
        while seen.len() < keys.len() {
            if let Some(KeyEvent::Char(c)) = router.poll() {
                seen.push(c);
                ack_tx.send(()).unwrap();
            } else {
                std::thread::yield_now();
            }
        }
        thread.join().unwrap();
        assert_eq!(seen, keys);
        assert_eq!(router.poll(), None);
    }
}
