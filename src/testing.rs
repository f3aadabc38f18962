//! Scripted radio and link used by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{LinkError, Result};
use crate::frame::HEART_RATE_MEASUREMENT_UUID;
use crate::transport::{Link, NotificationHandler, PeripheralRef, Radio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Scan,
    Connect,
    Subscribe,
    Unsubscribe,
    Disconnect,
}

pub type Journal = Arc<Mutex<Vec<(Instant, Event)>>>;

fn record(journal: &Journal, event: Event) {
    journal.lock().unwrap().push((Instant::now(), event));
}

pub fn times_of(journal: &Journal, event: Event) -> Vec<Instant> {
    journal
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, e)| *e == event)
        .map(|(at, _)| *at)
        .collect()
}

pub fn events(journal: &Journal) -> Vec<Event> {
    journal.lock().unwrap().iter().map(|(_, e)| *e).collect()
}

#[derive(Debug, Clone)]
pub enum ScanStep {
    Found(Vec<PeripheralRef>),
    Failed,
    NoAdapter,
}

/// Plays back `steps` one scan at a time, repeating the last one forever.
/// Each `connect` hands out the next queued link, or fails when none are left.
pub struct FakeRadio {
    steps: Mutex<VecDeque<ScanStep>>,
    links: Mutex<VecDeque<FakeLink>>,
    pub journal: Journal,
}

impl FakeRadio {
    pub fn new(steps: Vec<ScanStep>) -> Self {
        FakeRadio {
            steps: Mutex::new(steps.into()),
            links: Mutex::new(VecDeque::new()),
            journal: Journal::default(),
        }
    }

    pub fn with_link(self, link: FakeLink) -> Self {
        let link = FakeLink {
            journal: self.journal.clone(),
            ..link
        };
        self.links.lock().unwrap().push_back(link);
        self
    }

    pub fn scan_count(&self) -> usize {
        times_of(&self.journal, Event::Scan).len()
    }
}

#[async_trait]
impl Radio for FakeRadio {
    type Link = FakeLink;

    async fn scan(&self, _timeout: Duration) -> Result<Vec<PeripheralRef>> {
        record(&self.journal, Event::Scan);

        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };

        match step {
            Some(ScanStep::Found(peripherals)) => Ok(peripherals),
            Some(ScanStep::Failed) => Err(LinkError::Io(std::io::Error::other("radio busy"))),
            Some(ScanStep::NoAdapter) => Err(LinkError::NoAdapter),
            None => Ok(vec![]),
        }
    }

    async fn connect(&self, peripheral: &PeripheralRef) -> Result<FakeLink> {
        record(&self.journal, Event::Connect);
        self.links
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LinkError::UnknownPeripheral(peripheral.id.clone()))
    }
}

/// A connection that delivers `frames` (each after its own delay from
/// subscription) and reports itself disconnected `drop_after` subscription.
#[derive(Default)]
pub struct FakeLink {
    pub frames: Vec<(Duration, Vec<u8>)>,
    pub drop_after: Option<Duration>,
    pub fail_subscribe: bool,
    pub fail_unsubscribe: bool,
    pub panic_on_liveness: bool,
    pub journal: Journal,
    pub(crate) subscribed_at: Option<Instant>,
}

impl FakeLink {
    pub fn streaming(frames: Vec<(Duration, Vec<u8>)>) -> Self {
        FakeLink {
            frames,
            ..FakeLink::default()
        }
    }

    pub fn dropping_after(mut self, after: Duration) -> Self {
        self.drop_after = Some(after);
        self
    }
}

#[async_trait]
impl Link for FakeLink {
    async fn subscribe(&mut self, handler: NotificationHandler) -> Result<()> {
        record(&self.journal, Event::Subscribe);
        if self.fail_subscribe {
            return Err(LinkError::CharacteristicNotFound(HEART_RATE_MEASUREMENT_UUID));
        }

        let start = Instant::now();
        self.subscribed_at = Some(start);

        let frames = std::mem::take(&mut self.frames);
        tokio::spawn(async move {
            for (delay, frame) in frames {
                tokio::time::sleep_until(start + delay).await;
                handler(frame.as_slice());
            }
        });
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        if self.panic_on_liveness {
            panic!("liveness probe blew up");
        }
        let dropped = match (self.subscribed_at, self.drop_after) {
            (Some(at), Some(after)) => Instant::now() >= at + after,
            _ => false,
        };
        Ok(!dropped)
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        record(&self.journal, Event::Unsubscribe);
        if self.fail_unsubscribe {
            return Err(LinkError::Teardown("characteristic already gone".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        record(&self.journal, Event::Disconnect);
        Ok(())
    }
}
