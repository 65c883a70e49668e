/*!
 * Pipeline engine.
 *
 * The engine pushes each event through the chain of steps depth first: an
 * event produced by step N is handed to step N+1 before step N is asked
 * for its next output. One input event is therefore fully processed before
 * the next one enters the pipeline.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::errors::{PipelineError, PipelineResult};
use crate::event::Event;
use crate::pipeline::step::{Flow, Step};
use crate::resource::model::BatchItemContext;

/// Shared cancellation flag.
///
/// Cloned handles observe the same flag, so a host thread can cancel a
/// pipeline running elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Lifecycle state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Built but not running
    Paused,
    Running,
    Canceled,
    /// Last batch completed
    Succeeded,
    /// Steps released; the pipeline cannot run again
    Destroyed,
}

/// Receiver of the events leaving the last step.
pub type EventSink<'a> = dyn FnMut(Event) -> PipelineResult<()> + 'a;

/// An ordered chain of steps.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
    cancel_token: CancelToken,
    state: PipelineState,
    delivering_cancel: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancel_token: CancelToken::new(),
            state: PipelineState::Paused,
            delivering_cancel: false,
        }
    }

    /// Add a step at the end of the chain.
    pub fn add_step(&mut self, step: Box<dyn Step>) {
        debug!("Adding step '{}'", step.name());
        self.steps.push(step);
    }

    /// Builder form of `add_step`.
    pub fn with_step(mut self, step: Box<dyn Step>) -> Self {
        self.add_step(step);
        self
    }

    /// Names of the steps in order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Handle to cancel the pipeline from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel_token.clone()
    }

    /// Request cancellation. Observed at the next step invocation.
    pub fn cancel(&mut self) {
        info!("Cancel requested");
        self.cancel_token.cancel();
        for step in &mut self.steps {
            step.cancel();
        }
    }

    /// Send `START_BATCH` through the chain.
    pub fn start_batch(&mut self, sink: &mut EventSink<'_>) -> PipelineResult<()> {
        self.ensure_usable()?;
        self.cancel_token.reset();
        self.state = PipelineState::Running;
        info!("Starting batch with {} step(s)", self.steps.len());
        self.run(Event::start_batch(), sink)
    }

    /// Process one batch item: `START_BATCH_ITEM`, the input event, then
    /// `END_BATCH_ITEM`.
    ///
    /// When `START_BATCH_ITEM` or the input fails, steps still receive
    /// `END_BATCH_ITEM` so they can drop their per-item state, and the error
    /// is returned.
    pub fn process(&mut self, context: BatchItemContext, input: Event, sink: &mut EventSink<'_>) -> PipelineResult<()> {
        self.ensure_usable()?;
        let started = match self.run(Event::start_batch_item(context), sink) {
            Ok(()) => self.run(input, sink),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            if !e.is_batch_fatal() {
                self.reset_item();
            }
            return Err(e);
        }
        self.run(Event::end_batch_item(), sink)
    }

    /// Send `END_BATCH` through the chain.
    pub fn end_batch(&mut self, sink: &mut EventSink<'_>) -> PipelineResult<()> {
        self.ensure_usable()?;
        self.run(Event::end_batch(), sink)?;
        self.state = PipelineState::Succeeded;
        info!("Batch done");
        Ok(())
    }

    /// Release every step. The pipeline cannot be used afterwards.
    pub fn destroy(&mut self) {
        for step in &mut self.steps {
            step.destroy();
        }
        self.state = PipelineState::Destroyed;
    }

    /// Push one event through the chain, turning a cancellation into a
    /// `CANCELED` event delivered to every step and to the sink.
    fn run(&mut self, event: Event, sink: &mut EventSink<'_>) -> PipelineResult<()> {
        match self.push(0, event, sink) {
            Err(PipelineError::Canceled) => {
                self.deliver_cancel(sink)?;
                Err(PipelineError::Canceled)
            }
            other => other,
        }
    }

    fn push(&mut self, index: usize, event: Event, sink: &mut EventSink<'_>) -> PipelineResult<()> {
        if index == self.steps.len() {
            return sink(event);
        }
        self.checkpoint()?;

        let mut flow = self.steps[index].handle_event(event)?;
        loop {
            match flow {
                Flow::Produced(output) => {
                    self.push(index + 1, output, sink)?;
                    self.checkpoint()?;
                    flow = self.steps[index].resume()?;
                }
                Flow::NeedsMore | Flow::Done => return Ok(()),
            }
        }
    }

    fn checkpoint(&self) -> PipelineResult<()> {
        if !self.delivering_cancel && self.cancel_token.is_canceled() {
            return Err(PipelineError::Canceled);
        }
        Ok(())
    }

    fn deliver_cancel(&mut self, sink: &mut EventSink<'_>) -> PipelineResult<()> {
        warn!("Pipeline canceled");
        self.state = PipelineState::Canceled;
        self.delivering_cancel = true;
        let result = self.push(0, Event::canceled(), sink);
        self.delivering_cancel = false;
        result
    }

    /// Give every step an `END_BATCH_ITEM` directly, discarding what they
    /// emit, after an item failed half way.
    fn reset_item(&mut self) {
        for step in &mut self.steps {
            let mut flow = step.handle_event(Event::end_batch_item());
            while let Ok(Flow::Produced(_)) = flow {
                flow = step.resume();
            }
        }
    }

    fn ensure_usable(&self) -> PipelineResult<()> {
        if self.state == PipelineState::Destroyed {
            return Err(PipelineError::ContractViolation {
                expected: "a live pipeline".to_string(),
                found: "destroyed pipeline".to_string(),
            });
        }
        Ok(())
    }
}

/// Run a chain of steps over a single event and collect everything that
/// leaves the last step. Convenient for tests and small tools.
pub fn run_to_vec(pipeline: &mut Pipeline, events: Vec<Event>) -> PipelineResult<Vec<Event>> {
    let mut collected = Vec::new();
    let mut sink = |event: Event| -> PipelineResult<()> {
        collected.push(event);
        Ok(())
    };
    for event in events {
        pipeline.run(event, &mut sink)?;
    }
    Ok(collected)
}

/// Run a whole batch (`START_BATCH`, one item per input, `END_BATCH`) and
/// collect the output.
pub fn run_batch(pipeline: &mut Pipeline, items: Vec<(BatchItemContext, Event)>) -> PipelineResult<Vec<Event>> {
    let mut collected = Vec::new();
    let mut sink = |event: Event| -> PipelineResult<()> {
        collected.push(event);
        Ok(())
    };
    pipeline.start_batch(&mut sink)?;
    for (context, input) in items {
        pipeline.process(context, input, &mut sink)?;
    }
    pipeline.end_batch(&mut sink)?;
    Ok(collected)
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .field("state", &self.state)
            .finish()
    }
}
