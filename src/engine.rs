//! Single-writer session engine.
//!
//! One worker thread owns the `Session`; GPS and accelerometer producers on
//! any thread push events through a cloneable `EngineHandle`. Events are
//! applied strictly in channel order, so the session never needs a lock.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{SessionError, SessionResult};
use crate::session::{LiveSnapshot, Session};
use crate::summary::SessionSummary;
use crate::types::{AccelSample, GpsReading, SensorEvent};

pub enum EngineMessage {
    Event(SensorEvent),
    Start(Sender<SessionResult<()>>),
    Pause(Sender<SessionResult<()>>),
    Resume(Sender<SessionResult<()>>),
    Stop(Sender<SessionResult<SessionSummary>>),
    Snapshot(Sender<LiveSnapshot>),
    Shutdown,
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<EngineMessage>,
}

impl EngineHandle {
    pub fn submit(&self, event: SensorEvent) -> SessionResult<()> {
        self.tx
            .send(EngineMessage::Event(event))
            .map_err(|_| closed("event"))
    }

    pub fn submit_gps(&self, reading: GpsReading) -> SessionResult<()> {
        self.submit(SensorEvent::Gps(reading))
    }

    pub fn submit_accel(&self, sample: AccelSample) -> SessionResult<()> {
        self.submit(SensorEvent::Accel(sample))
    }

    pub fn start(&self) -> SessionResult<()> {
        self.request("start", EngineMessage::Start)?
    }

    pub fn pause(&self) -> SessionResult<()> {
        self.request("pause", EngineMessage::Pause)?
    }

    pub fn resume(&self) -> SessionResult<()> {
        self.request("resume", EngineMessage::Resume)?
    }

    pub fn stop(&self) -> SessionResult<SessionSummary> {
        self.request("stop", EngineMessage::Stop)?
    }

    pub fn snapshot(&self) -> SessionResult<LiveSnapshot> {
        self.request("snapshot", EngineMessage::Snapshot)
    }

    /// Send a command and block until the worker has applied it.
    fn request<T>(
        &self,
        what: &str,
        build: impl FnOnce(Sender<T>) -> EngineMessage,
    ) -> SessionResult<T> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.tx.send(build(reply_tx)).map_err(|_| closed(what))?;
        reply_rx.recv().map_err(|_| closed(what))
    }
}

fn closed(what: &str) -> SessionError {
    SessionError::EngineClosed(format!("{} after engine shutdown", what))
}

pub struct Engine {
    handle: EngineHandle,
    worker: Option<JoinHandle<Session>>,
}

impl Engine {
    /// Move `session` onto a dedicated worker thread.
    pub fn spawn(session: Session) -> Self {
        let (tx, rx) = channel::unbounded();
        let worker = thread::Builder::new()
            .name("session-engine".to_string())
            .spawn(move || run(session, rx))
            .ok();
        if worker.is_none() {
            log::error!("Failed to spawn session engine thread");
        }
        Engine {
            handle: EngineHandle { tx },
            worker,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the worker after it drains queued messages and hand the session
    /// back.
    pub fn shutdown(mut self) -> Option<Session> {
        let _ = self.handle.tx.send(EngineMessage::Shutdown);
        self.worker.take().and_then(|w| w.join().ok())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.tx.send(EngineMessage::Shutdown);
            let _ = worker.join();
        }
    }
}

fn run(mut session: Session, rx: Receiver<EngineMessage>) -> Session {
    log::debug!("Engine worker started for {}", session.session_id());
    let mut events: u64 = 0;

    for message in rx.iter() {
        match message {
            EngineMessage::Event(event) => {
                events += 1;
                session.handle_event(&event);
            }
            EngineMessage::Start(reply) => {
                let _ = reply.send(session.start());
            }
            EngineMessage::Pause(reply) => {
                let _ = reply.send(session.pause());
            }
            EngineMessage::Resume(reply) => {
                let _ = reply.send(session.resume());
            }
            EngineMessage::Stop(reply) => {
                let _ = reply.send(session.stop());
            }
            EngineMessage::Snapshot(reply) => {
                let _ = reply.send(session.snapshot());
            }
            EngineMessage::Shutdown => break,
        }
    }

    log::debug!("Engine worker exiting after {} events", events);
    session
}
