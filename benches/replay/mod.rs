use std::collections::VecDeque;
use std::convert::Infallible;

use libespat::at::{AtClient, AtConfig};
use libespat::serial::{Clock, Serial};

/// Answers every command line with the same canned reply.
#[derive(Debug, Default)]
pub struct ReplaySerial {
    rx: VecDeque<u8>,
    reply: Vec<u8>,
}

impl ReplaySerial {
    pub fn set_reply(&mut self, reply: &[u8]) {
        self.reply = reply.to_vec();
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }
}

impl Serial for ReplaySerial {
    type Error = Infallible;

    fn read_byte(&mut self, _timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
        Ok(self.rx.pop_front())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.ends_with(b"\r\n") {
            self.rx.extend(&self.reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn available(&mut self) -> usize {
        self.rx.len()
    }
}

/// Advances one millisecond per query so deadlines still expire.
#[derive(Debug, Default)]
pub struct TickClock {
    now: u32,
}

impl Clock for TickClock {
    fn now_ms(&mut self) -> u32 {
        self.now = self.now.wrapping_add(1);
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }
}

pub fn client(reply: &[u8]) -> AtClient<ReplaySerial, TickClock> {
    let mut serial = ReplaySerial::default();
    serial.set_reply(reply);
    AtClient::new(serial, TickClock::default(), AtConfig::default())
}
