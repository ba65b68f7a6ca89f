//! Background rule analysis.
//!
//! One dedicated thread drains a request queue and runs
//! [`RuleAnalyzer::analyze_rule`] for each entry, so a live simulation on
//! the caller's side never waits on an analysis. Progress is exposed as
//! submitted/completed counters with a blocking wait.
//!
//! A panic on the worker thread, in the analyzer or in a delivery
//! callback, still counts the request as completed and stops the worker:
//! waiters wake up and later submissions fail with
//! [`WorkerError::Disconnected`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::analysis::analyzer::{AnalysisResult, RuleAnalyzer};
use crate::automaton::rules::RuleSet;
use crate::error::{AnalysisError, WorkerError};
use crate::state::Dimensions;

#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub id: u64,
    pub rules: RuleSet,
    pub dimensions: Dimensions,
}

#[derive(Clone, Debug)]
pub struct AnalysisOutcome {
    pub id: u64,
    pub rule: String,
    pub result: Result<AnalysisResult, AnalysisError>,
}

#[derive(Default)]
struct Progress {
    submitted: AtomicU64,
    completed: AtomicU64,
    stopped: AtomicBool,
    lock: Mutex<()>,
    idle: Condvar,
}

impl Progress {
    fn finish_one(&self, failed: bool) {
        let _guard = self.lock.lock();
        if failed {
            self.stopped.store(true, Ordering::Release);
        }
        self.completed.fetch_add(1, Ordering::AcqRel);
        self.idle.notify_all();
    }

    fn stop(&self) {
        let _guard = self.lock.lock();
        self.stopped.store(true, Ordering::Release);
        self.idle.notify_all();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Nothing left to wait for: all requests finished or the thread is gone.
    fn is_idle(&self) -> bool {
        self.is_stopped()
            || self.completed.load(Ordering::Acquire) >= self.submitted.load(Ordering::Acquire)
    }
}

/// Counts the current request as completed when dropped, unwinding included.
struct RequestGuard<'a>(&'a Progress);

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_one(thread::panicking());
    }
}

/// Marks the worker stopped when the thread body exits for any reason.
struct ThreadGuard(Arc<Progress>);

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("analysis worker thread panicked");
        }
        self.0.stop();
    }
}

enum Delivery {
    Channel(Sender<AnalysisOutcome>),
    Callback(Box<dyn FnMut(&AnalysisOutcome) + Send>),
}

pub struct AnalysisWorker {
    requests: Option<Sender<AnalysisRequest>>,
    results: Receiver<AnalysisOutcome>,
    progress: Arc<Progress>,
    next_id: u64,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    /// Start a worker whose outcomes are collected with [`recv`](Self::recv)
    /// or [`try_recv`](Self::try_recv).
    pub fn spawn(analyzer: RuleAnalyzer) -> Result<Self, WorkerError> {
        let (tx, rx) = unbounded();
        Self::start(analyzer, Delivery::Channel(tx), rx)
    }

    /// Start a worker that hands every outcome to `callback` on the worker
    /// thread instead of queueing it.
    pub fn with_callback(
        analyzer: RuleAnalyzer,
        callback: impl FnMut(&AnalysisOutcome) + Send + 'static,
    ) -> Result<Self, WorkerError> {
        let (_, rx) = unbounded();
        Self::start(analyzer, Delivery::Callback(Box::new(callback)), rx)
    }

    fn start(
        analyzer: RuleAnalyzer,
        mut delivery: Delivery,
        results: Receiver<AnalysisOutcome>,
    ) -> Result<Self, WorkerError> {
        let (req_tx, req_rx) = unbounded::<AnalysisRequest>();
        let progress = Arc::new(Progress::default());
        let worker_progress = Arc::clone(&progress);

        let handle = thread::Builder::new()
            .name("rule-analysis".to_string())
            .spawn(move || {
                let thread_guard = ThreadGuard(worker_progress);
                for request in req_rx.iter() {
                    let _finish = RequestGuard(&*thread_guard.0);
                    debug!(id = request.id, rule = %request.rules.name, "analysis started");
                    let started = Instant::now();
                    let result = analyzer.analyze_rule(&request.rules, request.dimensions);
                    if let Err(err) = &result {
                        warn!(id = request.id, %err, "analysis failed");
                    }
                    let outcome = AnalysisOutcome {
                        id: request.id,
                        rule: request.rules.name,
                        result,
                    };
                    match &mut delivery {
                        Delivery::Channel(tx) => {
                            // The receiving side only goes away with the worker.
                            let _ = tx.send(outcome);
                        }
                        Delivery::Callback(cb) => cb(&outcome),
                    }
                    debug!(
                        id = request.id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "analysis finished"
                    );
                }
            })?;

        info!("analysis worker started");
        Ok(AnalysisWorker {
            requests: Some(req_tx),
            results,
            progress,
            next_id: 0,
            handle: Some(handle),
        })
    }

    /// Queue an analysis and return its id.
    pub fn submit(&mut self, rules: RuleSet, dimensions: Dimensions) -> Result<u64, WorkerError> {
        let tx = self.requests.as_ref().ok_or(WorkerError::Disconnected)?;
        if self.progress.is_stopped() {
            return Err(WorkerError::Disconnected);
        }
        let id = self.next_id;
        self.progress.submitted.fetch_add(1, Ordering::AcqRel);
        if tx
            .send(AnalysisRequest {
                id,
                rules,
                dimensions,
            })
            .is_err()
        {
            self.progress.submitted.fetch_sub(1, Ordering::AcqRel);
            return Err(WorkerError::Disconnected);
        }
        self.next_id += 1;
        Ok(id)
    }

    /// False once the worker thread has exited.
    pub fn is_running(&self) -> bool {
        !self.progress.is_stopped()
    }

    pub fn submitted(&self) -> u64 {
        self.progress.submitted.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.progress.completed.load(Ordering::Acquire)
    }

    /// Fraction of submitted requests that have finished; 1.0 when idle.
    pub fn progress(&self) -> f64 {
        let submitted = self.submitted();
        if submitted == 0 {
            return 1.0;
        }
        self.completed() as f64 / submitted as f64
    }

    /// Block until every submitted request has finished or the worker
    /// has stopped.
    pub fn wait_idle(&self) {
        let mut guard = self.progress.lock.lock();
        while !self.progress.is_idle() {
            self.progress.idle.wait(&mut guard);
        }
    }

    /// Like [`wait_idle`](Self::wait_idle) with a deadline. Returns whether
    /// the worker went idle in time.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.progress.lock.lock();
        while !self.progress.is_idle() {
            if self.progress.idle.wait_until(&mut guard, deadline).timed_out() {
                return self.progress.is_idle();
            }
        }
        true
    }

    pub fn try_recv(&self) -> Option<AnalysisOutcome> {
        self.results.try_recv().ok()
    }

    /// Block for the next outcome. Fails once the worker is gone and the
    /// queue is drained, or straight away for callback workers.
    pub fn recv(&self) -> Result<AnalysisOutcome, WorkerError> {
        self.results.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Stop accepting requests, finish the queued ones and join the thread.
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), WorkerError> {
        self.requests.take();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Disconnected),
            None => Ok(()),
        }
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
