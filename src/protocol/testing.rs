//! Scripted in-memory stream for framer and session tests

use crate::protocol::framer::FrameSource;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    /// Bytes delivered over as many reads as needed
    Data(Vec<u8>),
    /// No data until the armed timeout expires; sticky when last
    Stall,
    /// One byte every `every`, forever
    Trickle { byte: u8, every: Duration },
}

#[derive(Debug)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    armed: Duration,
    delivered: usize,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            armed: Duration::from_millis(10),
            delivered: 0,
        }
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Read for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining_steps = self.steps.len();
        match self.steps.front_mut() {
            None => Ok(0),
            Some(Step::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                bytes.drain(..n);
                if bytes.is_empty() {
                    self.steps.pop_front();
                }
                self.delivered += n;
                Ok(n)
            }
            Some(Step::Stall) => {
                thread::sleep(self.armed);
                if remaining_steps > 1 {
                    self.steps.pop_front();
                }
                Err(io::Error::from(ErrorKind::WouldBlock))
            }
            Some(Step::Trickle { byte, every }) => {
                let (byte, every) = (*byte, *every);
                thread::sleep(every);
                buf[0] = byte;
                self.delivered += 1;
                Ok(1)
            }
        }
    }
}

impl FrameSource for ScriptedSource {
    fn arm_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.armed = timeout;
        Ok(())
    }
}
