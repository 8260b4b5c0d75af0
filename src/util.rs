use smallvec::SmallVec;

/// Validates a text message one complete fragment at a time. A code point split
/// across a fragment boundary is held back until the next fragment arrives.
#[derive(Debug, Default)]
pub struct Utf8Validator {
    pending: SmallVec<[u8; 4]>,
}

impl Utf8Validator {
    /// Validates the next fragment of a message. With `fin` set the message must end on
    /// a code point boundary.
    pub fn validate(&mut self, mut fragment: &[u8], fin: bool) -> Result<(), InvalidUtf8> {
        // complete the code point left over from the previous fragment
        while !self.pending.is_empty() && !fragment.is_empty() {
            self.pending.push(fragment[0]);
            fragment = &fragment[1..];
            match std::str::from_utf8(&self.pending) {
                Ok(_) => self.pending.clear(),
                Err(err) if err.error_len().is_some() => return Err(self.fail()),
                Err(_) => {}
            }
        }

        match std::str::from_utf8(fragment) {
            Ok(_) => {}
            Err(err) if err.error_len().is_none() => self.pending.extend_from_slice(&fragment[err.valid_up_to()..]),
            Err(_) => return Err(self.fail()),
        }

        if fin && !self.pending.is_empty() {
            return Err(self.fail());
        }
        Ok(())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    #[cold]
    fn fail(&mut self) -> InvalidUtf8 {
        self.pending.clear();
        InvalidUtf8
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InvalidUtf8;
