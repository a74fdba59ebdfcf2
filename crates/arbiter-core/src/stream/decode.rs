//! Incremental UTF-8 decoding of a chunked body.

/// Invalid bytes in a chunk, with whatever text preceded them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUtf8 {
    /// Complete characters decoded before the invalid sequence.
    pub text: String,
    pub detail: String,
}

/// Carries a multi-byte character split across network chunks over to the
/// next chunk instead of rejecting it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    pub fn push(&mut self, bytes: &[u8]) -> Result<String, InvalidUtf8> {
        self.pending.extend_from_slice(bytes);
        let (valid, invalid) = match std::str::from_utf8(&self.pending) {
            Ok(_) => (self.pending.len(), None),
            Err(e) => (
                e.valid_up_to(),
                e.error_len().map(|_| format!("invalid utf-8 in stream: {e}")),
            ),
        };

        // Incomplete trailing sequence: keep the tail for the next chunk.
        let tail = self.pending.split_off(valid);
        let head = std::mem::replace(&mut self.pending, tail);
        let text = String::from_utf8_lossy(&head).into_owned();

        match invalid {
            None => Ok(text),
            Some(detail) => {
                self.pending.clear();
                Err(InvalidUtf8 { text, detail })
            }
        }
    }

    /// Fails if the stream ended inside a character.
    pub fn finish(&mut self) -> Result<(), String> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            let n = self.pending.len();
            self.pending.clear();
            Err(format!("stream ended with {n} dangling utf-8 byte(s)"))
        }
    }
}
