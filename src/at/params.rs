//! Parameter strings in the ESP-AT command grammar.
//!
//! Fields are comma-joined. Numbers are written in decimal; strings are
//! double-quoted with `\`, `"` and `,` escaped by a backslash.
//!
//! ```rust
//! use libespat::at::Params;
//!
//! let mut params = Params::assign();
//! params.number(0)?.quoted("sensors/a,b")?.number(1)?;
//! assert_eq!(params.as_str(), r#"=0,"sensors/a\,b",1"#);
//! # Ok::<(), libespat::Error>(())
//! ```

use core::fmt::Write as _;

use heapless::String;

use super::PARAMS_BUFFER_SIZE;
use crate::error::Error;

/// Builder for the `<params>` part of `AT<command><params>`.
#[derive(Debug, Clone, Default)]
pub struct Params {
    buf: String<PARAMS_BUFFER_SIZE>,
    fields: usize,
}

impl Params {
    /// An empty parameter string, for execute-style commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a set command, `=<fields>`.
    pub fn assign() -> Self {
        Self::with_lead('=')
    }

    /// A query command, `?`.
    pub fn query() -> Self {
        Self::with_lead('?')
    }

    fn with_lead(lead: char) -> Self {
        let mut params = Self::default();
        // Capacity is never zero.
        let _ = params.buf.push(lead);
        params
    }

    /// Appends a decimal field.
    pub fn number(&mut self, value: impl Into<i64>) -> Result<&mut Self, Error> {
        self.separator()?;
        write!(self.buf, "{}", value.into()).map_err(|_| Error::BufferOverflow)?;
        Ok(self)
    }

    /// Appends a quoted string field.
    pub fn quoted(&mut self, value: &str) -> Result<&mut Self, Error> {
        self.separator()?;
        self.push('"')?;
        for c in value.chars() {
            if matches!(c, '\\' | '"' | ',') {
                self.push('\\')?;
            }
            self.push(c)?;
        }
        self.push('"')?;
        Ok(self)
    }

    /// The built string.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Number of fields appended so far.
    pub fn fields(&self) -> usize {
        self.fields
    }

    fn separator(&mut self) -> Result<(), Error> {
        if self.fields > 0 {
            self.push(',')?;
        }
        self.fields += 1;
        Ok(())
    }

    fn push(&mut self, c: char) -> Result<(), Error> {
        self.buf.push(c).map_err(|_| Error::BufferOverflow)
    }
}
