//! Message boundary between the governor and an engine on its own thread.
//!
//! A [`Session`] owns one engine and answers typed [`Request`]s. A
//! [`SimulationWorker`] runs a session on a dedicated thread and talks to it
//! only through channels. The wire shape follows the serde attributes below:
//!
//! ```text
//! {"action":"start","payload":{"size":10,"initialAlive":[1,2]}}  -> "started"
//! {"action":"requestResults","payload":{"count":25}}              -> {"results":[..],"duration":0.4}
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineBackend, EngineConfig, GenerationDiff, LifeEngine, build_engine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    Start { size: u32, initial_alive: Vec<u32> },
    RequestResults { count: usize },
}

/// Consecutive generation diffs plus the time it took to compute them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsBatch {
    pub results: Vec<GenerationDiff>,
    /// Wall-clock compute time in milliseconds.
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Started,
    /// No engine could be built for the requested universe.
    Faulted { reason: String },
    #[serde(untagged)]
    Results(ResultsBatch),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn simulation worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("simulation worker has shut down")]
    Disconnected,
}

/// Step `engine` `count` times, or until `cancel` is raised.
///
/// A cancelled batch returns `None`; the engine keeps the generations it
/// already stepped.
pub fn run_batch(
    engine: &mut dyn LifeEngine,
    count: usize,
    cancel: &AtomicBool,
) -> Option<ResultsBatch> {
    let start = Instant::now();
    let mut results = Vec::with_capacity(count.min(1_024));
    for _ in 0..count {
        if cancel.load(Ordering::Acquire) {
            return None;
        }
        results.push(engine.step());
    }
    let duration = start.elapsed().as_secs_f64() * 1000.0;
    Some(ResultsBatch { results, duration })
}

/// One engine's lifetime on the far side of the boundary.
pub struct Session {
    config: EngineConfig,
    engine: Option<Box<dyn LifeEngine>>,
    cancel: Arc<AtomicBool>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cancel(config, Arc::new(AtomicBool::new(false)))
    }

    /// A session whose batches stop early once `cancel` is set.
    pub fn with_cancel(config: EngineConfig, cancel: Arc<AtomicBool>) -> Self {
        Self {
            config,
            engine: None,
            cancel,
        }
    }

    pub fn is_started(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> Option<&dyn LifeEngine> {
        self.engine.as_deref()
    }

    /// Answer one request. `None` means the request produces no reply.
    pub fn handle(&mut self, request: Request) -> Option<Response> {
        match request {
            Request::Start {
                size,
                initial_alive,
            } => {
                if self.engine.is_some() {
                    warn!(size, "session already started; ignoring start request");
                    return None;
                }
                match build_engine(&self.config, size, &initial_alive) {
                    Ok(engine) => {
                        info!(size, backend = ?engine.backend(), "session started");
                        self.engine = Some(engine);
                        Some(Response::Started)
                    }
                    Err(err) => {
                        error!(%err, size, "could not construct an engine");
                        Some(Response::Faulted {
                            reason: err.to_string(),
                        })
                    }
                }
            }
            Request::RequestResults { count } => {
                let Some(engine) = self.engine.as_deref_mut() else {
                    debug!(count, "results requested before start; ignoring");
                    return None;
                };
                let Some(batch) = run_batch(engine, count, &self.cancel) else {
                    debug!(count, generation = engine.generation(), "batch cancelled");
                    return None;
                };
                debug!(
                    count,
                    duration_ms = batch.duration,
                    generation = engine.generation(),
                    "batch computed"
                );
                Some(Response::Results(batch))
            }
        }
    }
}

/// The governor's view of wherever the engine lives.
pub trait BatchTransport {
    /// Fire-and-forget; never waits for the reply.
    fn post(&mut self, request: Request) -> Result<(), TransportError>;

    /// Next reply that has already arrived, if any.
    fn poll(&mut self) -> Option<Response>;

    fn terminate(&mut self);
}

impl<T: BatchTransport + ?Sized> BatchTransport for Box<T> {
    fn post(&mut self, request: Request) -> Result<(), TransportError> {
        (**self).post(request)
    }

    fn poll(&mut self) -> Option<Response> {
        (**self).poll()
    }

    fn terminate(&mut self) {
        (**self).terminate()
    }
}

#[derive(Debug)]
enum WorkerCommand {
    Request(Request),
    Shutdown,
}

/// A session running on its own named thread.
pub struct SimulationWorker {
    tx: mpsc::Sender<WorkerCommand>,
    rx: mpsc::Receiver<Response>,
    terminated: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SimulationWorker {
    pub fn spawn(config: EngineConfig) -> Result<Self, TransportError> {
        let (tx, command_rx) = mpsc::channel::<WorkerCommand>();
        let (response_tx, rx) = mpsc::channel::<Response>();
        let terminated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&terminated);

        let handle = thread::Builder::new()
            .name("torus-life-worker".into())
            .spawn(move || {
                let mut session = Session::with_cancel(config, Arc::clone(&flag));
                while let Ok(command) = command_rx.recv() {
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    let request = match command {
                        WorkerCommand::Request(request) => request,
                        WorkerCommand::Shutdown => break,
                    };
                    if let Some(response) = session.handle(request) {
                        if response_tx.send(response).is_err() {
                            debug!("response receiver dropped; stopping worker");
                            break;
                        }
                    }
                }
                debug!("simulation worker exiting");
            })
            .map_err(TransportError::Spawn)?;

        Ok(Self {
            tx,
            rx,
            terminated,
            handle: Some(handle),
        })
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Block up to `timeout` for the next reply.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Response> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Raise the cancel flag and queue `Shutdown`. Does not wait for the
    /// thread; a batch in progress stops before its next step.
    fn signal_shutdown(&mut self) {
        self.terminated.store(true, Ordering::Release);
        let _ = self.tx.send(WorkerCommand::Shutdown);
    }
}

impl BatchTransport for SimulationWorker {
    fn post(&mut self, request: Request) -> Result<(), TransportError> {
        if self.is_terminated() {
            return Err(TransportError::Disconnected);
        }
        self.tx
            .send(WorkerCommand::Request(request))
            .map_err(|_| TransportError::Disconnected)
    }

    fn poll(&mut self) -> Option<Response> {
        self.rx.try_recv().ok()
    }

    fn terminate(&mut self) {
        if !self.is_terminated() {
            info!("terminating simulation worker");
        }
        self.signal_shutdown();
    }
}

impl Drop for SimulationWorker {
    fn drop(&mut self) {
        self.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.join() {
                error!(?err, "simulation worker thread panicked");
            }
        }
    }
}

/// A session answered synchronously on the caller's thread.
pub struct InlineTransport {
    session: Session,
    outbox: VecDeque<Response>,
    terminated: bool,
}

impl InlineTransport {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            session: Session::new(config),
            outbox: VecDeque::new(),
            terminated: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl BatchTransport for InlineTransport {
    fn post(&mut self, request: Request) -> Result<(), TransportError> {
        if self.terminated {
            return Err(TransportError::Disconnected);
        }
        self.outbox.extend(self.session.handle(request));
        Ok(())
    }

    fn poll(&mut self) -> Option<Response> {
        self.outbox.pop_front()
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.outbox.clear();
    }
}

/// Start a worker thread, or run the reference engine inline if no thread can
/// be spawned.
pub fn connect(config: EngineConfig) -> Box<dyn BatchTransport + Send> {
    match SimulationWorker::spawn(config) {
        Ok(worker) => Box::new(worker),
        Err(err) => {
            error!(%err, "simulation worker unavailable; running reference engine inline");
            Box::new(InlineTransport::new(
                EngineConfig::default().backend(EngineBackend::Reference),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    use super::{BatchTransport, InlineTransport, Request, Response, Session, SimulationWorker};
    use crate::engine::{EngineBackend, EngineConfig, GenerationDiff};

    fn reference() -> EngineConfig {
        EngineConfig::default().backend(EngineBackend::Reference)
    }

    fn start(size: u32, initial_alive: &[u32]) -> Request {
        Request::Start {
            size,
            initial_alive: initial_alive.to_vec(),
        }
    }

    #[test]
    fn results_before_start_are_ignored() {
        let mut session = Session::new(reference());
        assert_eq!(session.handle(Request::RequestResults { count: 5 }), None);
        assert!(!session.is_started());
    }

    #[test]
    fn start_then_batch_returns_count_diffs() {
        let mut session = Session::new(reference());
        assert_eq!(session.handle(start(10, &[44, 45, 46])), Some(Response::Started));
        let Some(Response::Results(batch)) =
            session.handle(Request::RequestResults { count: 4 })
        else {
            panic!("expected a results batch");
        };
        assert_eq!(batch.results.len(), 4);
        assert!(batch.duration >= 0.0);
        assert_eq!(session.engine().unwrap().generation(), 4);
    }

    #[test]
    fn second_start_is_rejected() {
        let mut session = Session::new(reference());
        session.handle(start(10, &[1]));
        assert_eq!(session.handle(start(20, &[2])), None);
        assert_eq!(session.engine().unwrap().size(), 10);
    }

    #[test]
    fn zero_sized_universe_faults() {
        let mut session = Session::new(reference());
        let reply = session.handle(start(0, &[]));
        assert!(matches!(reply, Some(Response::Faulted { .. })));
        assert!(!session.is_started());
    }

    #[test]
    fn inline_transport_queues_replies() {
        let mut transport = InlineTransport::new(reference());
        transport.post(Request::RequestResults { count: 1 }).unwrap();
        assert_eq!(transport.poll(), None);
        transport.post(start(10, &[0])).unwrap();
        assert_eq!(transport.poll(), Some(Response::Started));
        transport.terminate();
        assert!(transport.post(Request::RequestResults { count: 1 }).is_err());
    }

    #[test]
    fn worker_round_trip() {
        let mut worker = SimulationWorker::spawn(reference()).unwrap();
        worker.post(start(10, &[55])).unwrap();
        assert_eq!(
            worker.recv_timeout(Duration::from_secs(5)),
            Some(Response::Started)
        );
        worker.post(Request::RequestResults { count: 2 }).unwrap();
        let Some(Response::Results(batch)) = worker.recv_timeout(Duration::from_secs(5)) else {
            panic!("expected a results batch");
        };
        assert_eq!(
            batch.results,
            vec![
                GenerationDiff {
                    born: vec![],
                    died: vec![55],
                },
                GenerationDiff::default(),
            ]
        );
    }

    #[test]
    fn cancelled_session_abandons_batch() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut session = Session::with_cancel(reference(), Arc::clone(&cancel));
        session.handle(start(10, &[44, 45, 46]));
        cancel.store(true, Ordering::Release);
        assert_eq!(session.handle(Request::RequestResults { count: 1_000 }), None);
        assert_eq!(session.engine().unwrap().generation(), 0);
    }

    #[test]
    fn terminate_does_not_wait_for_a_running_batch() {
        let soup: Vec<u32> = (0..256u32 * 256)
            .filter(|i| i.wrapping_mul(2_654_435_761) % 5 < 2)
            .collect();
        let mut worker = SimulationWorker::spawn(reference()).unwrap();
        worker.post(start(256, &soup)).unwrap();
        assert_eq!(
            worker.recv_timeout(Duration::from_secs(5)),
            Some(Response::Started)
        );
        // Far more work than the test could ever finish.
        worker
            .post(Request::RequestResults { count: 10_000_000 })
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let began = Instant::now();
        worker.terminate();
        assert!(began.elapsed() < Duration::from_millis(50));

        // Dropping joins the thread, which exits before its next step.
        let began = Instant::now();
        drop(worker);
        assert!(began.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn terminated_worker_refuses_requests() {
        let mut worker = SimulationWorker::spawn(reference()).unwrap();
        worker.terminate();
        assert!(worker.is_terminated());
        assert!(worker.post(Request::RequestResults { count: 1 }).is_err());
    }
}
