//! Operator key input.
//!
//! Two producers feed the router: a background listener that posts into a
//! shared single-slot mailbox, and a focus-scoped source checked on each
//! poll. Every key press is delivered at most once.

mod focus;
mod key;
mod listener;
mod mailbox;
mod router;

pub use focus::{ChannelFocus, FocusSource, NoFocus};
pub use key::{KeyEvent, RawKey};
pub use listener::{parse_key_line, KeyListener, KeySource, LineKeys};
pub use mailbox::Mailbox;
pub use router::InputRouter;
