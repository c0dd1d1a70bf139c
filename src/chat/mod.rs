//! Chat module - keyword intent answers and the conversation log

mod intent;
mod session;

pub use intent::{
    Intent, IntentResponder, EMPTY_DATA_MESSAGE, EV_INFO_MESSAGE, HELP_MESSAGE, NO_DATA_MESSAGE,
};
pub use session::{ChatMessage, ChatSession, Role, GREETING};

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// Stream `text` to `out` one character at a time.
///
/// Only presentation changes; the text written is always exactly `text`.
pub fn typewrite<W: Write>(out: &mut W, text: &str, delay: Duration) -> io::Result<()> {
    if delay.is_zero() {
        out.write_all(text.as_bytes())?;
        return out.flush();
    }

    let mut buf = [0u8; 4];
    for c in text.chars() {
        out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
        out.flush()?;
        thread::sleep(delay);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typewriter_writes_the_exact_text() {
        let text = "Total for **Europe**: 1,234 vehicles ✓";
        let mut out = Vec::new();
        typewrite(&mut out, text, Duration::from_micros(1)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);

        let mut out = Vec::new();
        typewrite(&mut out, text, Duration::ZERO).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), text);
    }
}
