#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use libespat::at::{AtClient, AtConfig};
use libespat::serial::{Clock, Serial};

const PARTITION_SIZE: usize = 0x2000;
const FLASH_NAMES: [&str; 3] = ["mqtt_cert", "mqtt_key", "mqtt_ca"];

/// One scripted command and what the device answers.
struct Exchange {
    prefix: String,
    replies: Vec<(u32, Vec<u8>)>,
    raw: Option<(usize, Vec<u8>)>,
}

/// Raw bytes the device is collecting after a `>` prompt.
enum Capture {
    Script {
        remaining: usize,
        data: Vec<u8>,
        after: Vec<u8>,
    },
    Flash {
        name: String,
        offset: usize,
        remaining: usize,
        data: Vec<u8>,
    },
}

#[derive(Default)]
struct State {
    now: u32,
    rx: VecDeque<(u32, u8)>,
    line: Vec<u8>,
    script: VecDeque<Exchange>,
    commands: Vec<(u32, String)>,
    capture: Option<Capture>,
    raw_payloads: Vec<Vec<u8>>,
    flash: Option<HashMap<String, Vec<u8>>>,
    erases: usize,
    flash_writes: usize,
    flash_reads: usize,
}

impl State {
    fn push_rx(&mut self, delay: u32, bytes: &[u8]) {
        let last = self.rx.back().map_or(0, |&(t, _)| t);
        let ready = (self.now + delay).max(last);
        for &b in bytes {
            self.rx.push_back((ready, b));
        }
    }

    fn on_tx(&mut self, byte: u8) {
        if let Some(capture) = self.capture.as_mut() {
            match capture {
                Capture::Script {
                    remaining, data, ..
                }
                | Capture::Flash {
                    remaining, data, ..
                } => {
                    data.push(byte);
                    *remaining -= 1;
                    if *remaining > 0 {
                        return;
                    }
                }
            }
            match self.capture.take() {
                Some(Capture::Script { data, after, .. }) => {
                    self.raw_payloads.push(data);
                    self.push_rx(0, &after);
                }
                Some(Capture::Flash {
                    name, offset, data, ..
                }) => {
                    self.raw_payloads.push(data.clone());
                    if let Some(part) = self.flash.as_mut().and_then(|f| f.get_mut(&name)) {
                        for (cell, b) in part[offset..].iter_mut().zip(&data) {
                            *cell &= *b;
                        }
                    }
                    self.push_rx(0, b"\r\nOK\r\n");
                }
                None => {}
            }
            return;
        }

        self.line.push(byte);
        if self.line.ends_with(b"\r\n") {
            let line = String::from_utf8_lossy(&self.line[..self.line.len() - 2]).into_owned();
            self.line.clear();
            self.on_command(line);
        }
    }

    fn on_command(&mut self, line: String) {
        self.commands.push((self.now, line.clone()));

        if self.flash.is_some() {
            if let Some(args) = line.strip_prefix("AT+SYSFLASH=") {
                self.on_sysflash(args);
                return;
            }
        }

        let Some(front) = self.script.front() else {
            return;
        };
        if !line.starts_with(&front.prefix) {
            panic!("unexpected command {line:?}, expected {:?}", front.prefix);
        }
        let exchange = self.script.pop_front().unwrap();
        for (delay, bytes) in &exchange.replies {
            self.push_rx(*delay, bytes);
        }
        if let Some((len, after)) = exchange.raw {
            self.capture = Some(Capture::Script {
                remaining: len,
                data: Vec::new(),
                after,
            });
        }
    }

    fn on_sysflash(&mut self, args: &str) {
        let fields: Vec<&str> = args.split(',').collect();
        let op: u32 = fields[0].parse().unwrap();
        let name = fields[1].trim_matches('"').to_string();
        let offset: usize = fields.get(2).map_or(0, |f| f.parse().unwrap());
        let flash = self.flash.as_mut().unwrap();
        let Some(part) = flash.get_mut(&name) else {
            self.push_rx(0, b"\r\nERROR\r\n");
            return;
        };

        match op {
            0 => {
                self.erases += 1;
                let len: usize = fields.get(3).map_or(PARTITION_SIZE, |f| f.parse().unwrap());
                for b in &mut part[offset..offset + len] {
                    *b = 0xFF;
                }
                self.push_rx(0, b"\r\nOK\r\n");
            }
            1 => {
                self.flash_writes += 1;
                let len: usize = fields[3].parse().unwrap();
                self.capture = Some(Capture::Flash {
                    name,
                    offset,
                    remaining: len,
                    data: Vec::new(),
                });
                self.push_rx(0, b"\r\nOK\r\n\r\n>");
            }
            2 => {
                self.flash_reads += 1;
                let len: usize = fields[3].parse().unwrap();
                let mut reply = format!("+SYSFLASH:{len},").into_bytes();
                reply.extend_from_slice(&part[offset..offset + len]);
                reply.extend_from_slice(b"\r\nOK\r\n");
                self.push_rx(0, &reply);
            }
            _ => self.push_rx(0, b"\r\nERROR\r\n"),
        }
    }
}

/// A simulated ESP-AT device on a virtual clock.
#[derive(Clone, Default)]
pub struct Sim {
    state: Rc<RefCell<State>>,
}

impl Sim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulates the three PKI partitions behind `AT+SYSFLASH`, all erased.
    pub fn with_flash() -> Self {
        let sim = Self::new();
        let flash = FLASH_NAMES
            .iter()
            .map(|n| (n.to_string(), vec![0xFF; PARTITION_SIZE]))
            .collect();
        sim.state.borrow_mut().flash = Some(flash);
        sim
    }

    pub fn serial(&self) -> SimSerial {
        SimSerial { sim: self.clone() }
    }

    pub fn clock(&self) -> SimClock {
        SimClock { sim: self.clone() }
    }

    pub fn client(&self) -> AtClient<SimSerial, SimClock> {
        AtClient::new(self.serial(), self.clock(), AtConfig::default())
    }

    pub fn client_with(&self, config: AtConfig) -> AtClient<SimSerial, SimClock> {
        AtClient::new(self.serial(), self.clock(), config)
    }

    /// Answers the next command starting with `prefix` with `reply`.
    pub fn expect(&self, prefix: &str, reply: &[u8]) {
        self.expect_replies(prefix, &[(0, reply)]);
    }

    /// Answers with several replies, each `delay` ms after the command.
    pub fn expect_replies(&self, prefix: &str, replies: &[(u32, &[u8])]) {
        self.state.borrow_mut().script.push_back(Exchange {
            prefix: prefix.to_string(),
            replies: replies.iter().map(|(d, r)| (*d, r.to_vec())).collect(),
            raw: None,
        });
    }

    /// Answers with `reply`, then collects `len` raw bytes and answers `after`.
    pub fn expect_raw(&self, prefix: &str, reply: &[u8], len: usize, after: &[u8]) {
        self.state.borrow_mut().script.push_back(Exchange {
            prefix: prefix.to_string(),
            replies: vec![(0, reply.to_vec())],
            raw: Some((len, after.to_vec())),
        });
    }

    /// Queues unsolicited bytes, available right away.
    pub fn push_rx(&self, bytes: &[u8]) {
        self.state.borrow_mut().push_rx(0, bytes);
    }

    /// Queues unsolicited bytes that arrive after `delay` ms.
    pub fn push_rx_after(&self, delay: u32, bytes: &[u8]) {
        self.state.borrow_mut().push_rx(delay, bytes);
    }

    pub fn advance(&self, ms: u32) {
        self.state.borrow_mut().now += ms;
    }

    pub fn now(&self) -> u32 {
        self.state.borrow().now
    }

    pub fn commands(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn command_times(&self) -> Vec<u32> {
        self.state.borrow().commands.iter().map(|(t, _)| *t).collect()
    }

    pub fn raw_payloads(&self) -> Vec<Vec<u8>> {
        self.state.borrow().raw_payloads.clone()
    }

    /// Scripted exchanges not consumed yet.
    pub fn pending(&self) -> usize {
        self.state.borrow().script.len()
    }

    /// Bytes queued towards the host and not read yet.
    pub fn unread(&self) -> usize {
        self.state.borrow().rx.len()
    }

    pub fn partition(&self, name: &str) -> Vec<u8> {
        self.state.borrow().flash.as_ref().unwrap()[name].clone()
    }

    pub fn set_partition(&self, name: &str, content: &[u8]) {
        let mut state = self.state.borrow_mut();
        let part = state.flash.as_mut().unwrap().get_mut(name).unwrap();
        part[..content.len()].copy_from_slice(content);
    }

    pub fn erase_count(&self) -> usize {
        self.state.borrow().erases
    }

    pub fn flash_write_count(&self) -> usize {
        self.state.borrow().flash_writes
    }

    pub fn flash_read_count(&self) -> usize {
        self.state.borrow().flash_reads
    }
}

pub struct SimSerial {
    sim: Sim,
}

impl std::fmt::Debug for SimSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SimSerial")
    }
}

impl Serial for SimSerial {
    type Error = Infallible;

    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
        let mut state = self.sim.state.borrow_mut();
        match state.rx.front().copied() {
            Some((ready, byte)) if ready <= state.now + timeout_ms => {
                state.now = state.now.max(ready);
                state.rx.pop_front();
                Ok(Some(byte))
            }
            _ => {
                state.now += timeout_ms;
                Ok(None)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.sim.state.borrow_mut();
        for &b in buf {
            state.on_tx(b);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn available(&mut self) -> usize {
        let state = self.sim.state.borrow();
        state.rx.iter().take_while(|(t, _)| *t <= state.now).count()
    }
}

pub struct SimClock {
    sim: Sim,
}

impl std::fmt::Debug for SimClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SimClock")
    }
}

impl Clock for SimClock {
    fn now_ms(&mut self) -> u32 {
        self.sim.state.borrow().now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sim.state.borrow_mut().now += ms;
    }
}
