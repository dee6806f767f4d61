use std::io::{self, BufRead};
use std::thread::JoinHandle;

use anyhow::{Context, Result};

use super::key::{KeyEvent, RawKey};
use super::mailbox::Mailbox;

/// Blocking key producer. `None` means the source is exhausted.
pub trait KeySource: Send {
    fn next_key(&mut self) -> Option<RawKey>;
}

/// Keys typed on a line-buffered reader, one command per line.
///
/// `space`, `esc` and `escape` name the sentinel keys; otherwise the first
/// character of the line is the key. Blank lines are ignored.
pub struct LineKeys<R> {
    reader: R,
}

impl<R: BufRead + Send> LineKeys<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineKeys<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

pub fn parse_key_line(line: &str) -> Option<RawKey> {
    let word = line.trim();
    match word.to_ascii_lowercase().as_str() {
        "" => None,
        "space" => Some(RawKey::Space),
        "esc" | "escape" => Some(RawKey::Escape),
        _ => word.chars().next().map(RawKey::Char),
    }
}

impl<R: BufRead + Send> KeySource for LineKeys<R> {
    fn next_key(&mut self) -> Option<RawKey> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    if let Some(key) = parse_key_line(&line) {
                        return Some(key);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::warn!("key input read failed: {}", err);
                    return None;
                }
            }
        }
    }
}

/// Background thread feeding a `KeySource` into a `Mailbox`.
#[derive(Debug)]
pub struct KeyListener {
    join: Option<JoinHandle<()>>,
}

impl KeyListener {
    pub fn spawn<S>(mut source: S, mailbox: Mailbox) -> Result<Self>
    where
        S: KeySource + 'static,
    {
        let join = std::thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                log::debug!("key listener started");
                while let Some(raw) = source.next_key() {
                    if let Some(event) = KeyEvent::normalize(raw) {
                        mailbox.post(event);
                    }
                }
                log::debug!("key listener stopped: source closed");
            })
            .context("spawn key listener thread")?;
        Ok(Self { join: Some(join) })
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Wait for the source to close. Blocks forever on an open terminal.
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("key listener thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_words_and_characters() {
        assert_eq!(parse_key_line("g\n"), Some(RawKey::Char('g')));
        assert_eq!(parse_key_line("  Space "), Some(RawKey::Space));
        assert_eq!(parse_key_line("ESC"), Some(RawKey::Escape));
        assert_eq!(parse_key_line("   \n"), None);
    }

    #[test]
    fn listener_posts_normalized_keys() {
        let mailbox = Mailbox::new();
        let source = LineKeys::new(Cursor::new("\nQ\n"));
        let listener = KeyListener::spawn(source, mailbox.clone()).unwrap();
        listener.join();
        assert_eq!(mailbox.take(), Some(KeyEvent::Char('q')));
        assert_eq!(mailbox.take(), None);
    }
}
