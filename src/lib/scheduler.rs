//! Chunked multi-stage pipeline scheduler.
//!
//! The pipeline is a static DAG of stages identified by integer ids. Each
//! stage declares an ordering discipline and a `process` operation that maps
//! one input chunk to zero or more `(target, chunk)` outputs. A shared pool
//! of worker threads drives every stage; chunks are the unit of work.
//!
//! # Sequencing and ordering
//!
//! Every chunk inherits the sequence number of the source chunk it was
//! derived from, and every stage emits exactly one chunk per input chunk on
//! each of its live output edges (empty chunks included). Edges therefore
//! see the dense sequence `0..n` and an `Ordered` stage can simply wait for
//! the next-expected number, which also serializes its `process` calls.
//! `Unordered` stages dispatch freely across workers.
//!
//! # End of stream
//!
//! The final chunk on an edge carries a sticky `eof` flag. Once it is
//! enqueued, any later-sequenced chunk on the same edge is a wiring error.
//! Sink stages close their outputs when they process their `eof` chunk.
//!
//! # Back-pressure and failure
//!
//! The source stage is re-triggered only while the number of in-flight
//! chunks stays under a bound proportional to the pool size, and idle
//! workers prefer the most-downstream runnable chunk, keeping memory flat.
//! The first error cancels the run: queued chunks are discarded, in-flight
//! work drains, and the error is surfaced to the caller.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::chunks::Chunk;
use crate::errors::{PipelineError, Result};

/// Identifier of a stage and of the edge delivering chunks to it.
pub type StepId = usize;

/// In-flight chunk bound per worker; throttles the source stage.
const CHUNKS_PER_THREAD: usize = 4;

/// Ordering discipline of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOrdering {
    /// Chunks are processed one at a time, in source order
    Ordered,
    /// Any worker may process any chunk concurrently
    Unordered,
}

/// One stage of the pipeline.
///
/// Implementations are immutable after registration; stages needing mutable
/// state (writers, statistics) use interior mutability, keeping locks away
/// from the scheduler's own synchronization.
pub trait PipelineStep: Send + Sync {
    /// The stage's ordering discipline; queried once per dispatch.
    fn ordering(&self) -> StepOrdering;

    /// Process one chunk, returning routed outputs.
    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>>;
}

impl<S: PipelineStep + ?Sized> PipelineStep for Arc<S> {
    fn ordering(&self) -> StepOrdering {
        (**self).ordering()
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        (**self).process(chunk)
    }
}

struct RegisteredStep {
    name: String,
    ordering: StepOrdering,
    step: Box<dyn PipelineStep>,
}

/// Mutable per-edge state, guarded by the scheduler mutex.
struct EdgeState {
    /// Pending chunks; kept sorted by sequence for ordered stages
    queue: VecDeque<(u64, Chunk)>,
    /// Next sequence an ordered stage may dispatch
    next_dispatch: u64,
    /// Number of workers currently inside this stage's `process`
    running: usize,
    /// Sequence of the eof chunk, once enqueued
    eof_seq: Option<u64>,
}

impl EdgeState {
    fn new() -> Self {
        Self { queue: VecDeque::new(), next_dispatch: 0, running: 0, eof_seq: None }
    }
}

struct RunState {
    edges: BTreeMap<StepId, EdgeState>,
    /// Queued plus running chunks across all edges
    live: usize,
    /// Sequence number for the next source trigger
    source_seq: u64,
    /// A trigger is queued or the source is processing one
    source_busy: bool,
    /// The source has emitted its eof chunk
    source_done: bool,
    error: Option<PipelineError>,
    cancelled: bool,
}

/// Multi-producer/multi-consumer scheduler over a static stage graph.
pub struct Scheduler {
    steps: BTreeMap<StepId, RegisteredStep>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self { steps: BTreeMap::new() }
    }

    /// Register `step` under `id`.
    ///
    /// Ids must be unique; the id doubles as the stage's input edge id.
    pub fn add_step(&mut self, id: StepId, name: &str, step: Box<dyn PipelineStep>) -> Result<()> {
        let ordering = step.ordering();
        let previous =
            self.steps.insert(id, RegisteredStep { name: name.to_string(), ordering, step });
        if previous.is_some() {
            return Err(PipelineError::ConfigInvalid(format!(
                "stage id {id} registered twice ('{name}')"
            )));
        }
        debug!("registered stage {id}: {name}");
        Ok(())
    }

    /// Run the graph to completion on a pool of `max_threads` workers.
    ///
    /// `source` names the stage that produces input chunks; it is triggered
    /// with [`Chunk::Start`] until it emits a chunk flagged `eof`. Returns
    /// the first error raised by any stage.
    pub fn run(self, source: StepId, max_threads: usize) -> Result<()> {
        if !self.steps.contains_key(&source) {
            return Err(PipelineError::ConfigInvalid(format!("unknown source stage id {source}")));
        }

        let threads = max_threads.max(1);
        let capacity = CHUNKS_PER_THREAD * threads;

        let mut edges = BTreeMap::new();
        for id in self.steps.keys() {
            edges.insert(*id, EdgeState::new());
        }

        let state = Mutex::new(RunState {
            edges,
            live: 0,
            source_seq: 0,
            source_busy: false,
            source_done: false,
            error: None,
            cancelled: false,
        });
        let condvar = Condvar::new();

        {
            let mut guard = state.lock();
            enqueue_trigger(&mut guard, source);
        }

        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| self.worker(source, capacity, &state, &condvar));
            }
        });

        let mut final_state = state.into_inner();
        match final_state.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn worker(
        &self,
        source: StepId,
        capacity: usize,
        state: &Mutex<RunState>,
        condvar: &Condvar,
    ) {
        let mut guard = state.lock();

        loop {
            if let Some((id, seq, chunk)) = dispatch(&mut guard, &self.steps) {
                let cancelled = guard.cancelled;
                drop(guard);

                // Cancelled runs drain chunks without touching the stages
                let outcome = if cancelled {
                    Ok(Vec::new())
                } else {
                    self.steps[&id].step.process(chunk)
                };

                guard = state.lock();
                if let Some(edge) = guard.edges.get_mut(&id) {
                    edge.running -= 1;
                }
                guard.live -= 1;

                match outcome {
                    Ok(outputs) => {
                        let mut emitted_eof = false;
                        for (target, chunk) in outputs {
                            emitted_eof |= chunk.is_eof();
                            if let Err(error) = enqueue(&mut guard, target, seq, chunk) {
                                cancel(&mut guard, error);
                                break;
                            }
                        }
                        if id == source {
                            guard.source_busy = false;
                            if emitted_eof {
                                guard.source_done = true;
                            }
                        }
                    }
                    Err(error) => {
                        if id == source {
                            guard.source_busy = false;
                        }
                        cancel(&mut guard, error);
                    }
                }

                maybe_trigger_source(&mut guard, source, capacity);
                condvar.notify_all();
                continue;
            }

            if run_finished(&guard) {
                condvar.notify_all();
                return;
            }

            condvar.wait(&mut guard);
        }
    }
}

/// Pick the next runnable chunk, preferring the most-downstream stage.
fn dispatch(
    state: &mut RunState,
    steps: &BTreeMap<StepId, RegisteredStep>,
) -> Option<(StepId, u64, Chunk)> {
    // Highest ids sit at the writer end of the graph; draining them first
    // bounds the number of buffered chunks
    let ids: Vec<StepId> = state.edges.keys().rev().copied().collect();

    for id in ids {
        let ordering = steps[&id].ordering;
        let edge = state.edges.get_mut(&id).expect("edge exists for every registered stage");

        let ready = match ordering {
            StepOrdering::Unordered => !edge.queue.is_empty(),
            StepOrdering::Ordered => {
                edge.running == 0
                    && edge.queue.front().is_some_and(|(seq, _)| *seq == edge.next_dispatch)
            }
        };

        if ready {
            let (seq, chunk) = edge.queue.pop_front().expect("readiness implies a queued chunk");
            if ordering == StepOrdering::Ordered {
                edge.next_dispatch = seq + 1;
            }
            edge.running += 1;
            return Some((id, seq, chunk));
        }
    }

    None
}

/// Deliver a chunk to `target`, keeping ordered queues sequence-sorted.
fn enqueue(state: &mut RunState, target: StepId, seq: u64, chunk: Chunk) -> Result<()> {
    let Some(edge) = state.edges.get_mut(&target) else {
        return Err(PipelineError::ConfigInvalid(format!(
            "chunk routed to unknown stage id {target}"
        )));
    };

    if let Some(eof_seq) = edge.eof_seq {
        if seq > eof_seq {
            return Err(PipelineError::SchedulerCancelled(format!(
                "chunk enqueued on stage {target} after end-of-stream"
            )));
        }
    }

    if chunk.is_eof() {
        edge.eof_seq = Some(seq);
    }

    // Insertion sort by sequence; chunks arrive nearly in order
    let position = edge
        .queue
        .iter()
        .rposition(|(existing, _)| *existing < seq)
        .map_or(0, |index| index + 1);
    edge.queue.insert(position, (seq, chunk));

    state.live += 1;
    Ok(())
}

fn enqueue_trigger(state: &mut RunState, source: StepId) {
    let seq = state.source_seq;
    state.source_seq += 1;
    state.source_busy = true;
    let edge = state.edges.get_mut(&source).expect("source edge exists");
    edge.queue.push_back((seq, Chunk::Start));
    state.live += 1;
}

/// Re-trigger the source while it has data left and memory allows.
fn maybe_trigger_source(state: &mut RunState, source: StepId, capacity: usize) {
    if !state.source_done && !state.source_busy && !state.cancelled && state.live < capacity {
        enqueue_trigger(state, source);
    }
}

/// First failure wins; queued work is discarded and edges closed.
fn cancel(state: &mut RunState, error: PipelineError) {
    if state.error.is_none() {
        state.error = Some(error);
    }
    state.cancelled = true;
    state.source_done = true;

    let mut discarded = 0;
    for edge in state.edges.values_mut() {
        discarded += edge.queue.len();
        edge.queue.clear();
    }
    state.live -= discarded;
}

fn run_finished(state: &RunState) -> bool {
    (state.source_done || state.cancelled) && state.live == 0
}
