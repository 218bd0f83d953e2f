//! Render context: owns the active graph and the audio clock.
//!
//! The clock is the number of frames pulled by the host divided by the sample
//! rate, so it advances only as audio is actually rendered. The host's render
//! callback and the async control side share the state through a
//! `parking_lot::Mutex` that is never held across an `.await`.

use crate::graph::{TuningGraph, GRAPH_NODE_COUNT};
use bridge_traits::RenderSource;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct ContextState {
    frames_rendered: u64,
    graph: Option<TuningGraph>,
}

/// Cheap to clone; clones share the same clock and graph slot.
#[derive(Debug, Clone)]
pub struct SynthContext {
    sample_rate: u32,
    state: Arc<Mutex<ContextState>>,
}

impl SynthContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Arc::new(Mutex::new(ContextState {
                frames_rendered: 0,
                graph: None,
            })),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.state.lock().frames_rendered as f64 / self.sample_rate as f64
    }

    /// Install `graph`, returning the one it replaces.
    pub fn install(&self, graph: TuningGraph) -> Option<TuningGraph> {
        self.state.lock().graph.replace(graph)
    }

    /// Remove the graph with its sources stopped.
    pub fn dispose(&self) -> Option<TuningGraph> {
        let mut graph = self.state.lock().graph.take()?;
        graph.stop_sources();
        Some(graph)
    }

    /// Run `f` against the active graph and the current render time.
    pub fn with_graph<T>(&self, f: impl FnOnce(&mut TuningGraph, f64) -> T) -> Option<T> {
        let mut state = self.state.lock();
        let now = state.frames_rendered as f64 / self.sample_rate as f64;
        state.graph.as_mut().map(|graph| f(graph, now))
    }

    pub fn active_node_count(&self) -> usize {
        if self.state.lock().graph.is_some() {
            GRAPH_NODE_COUNT
        } else {
            0
        }
    }

    /// Render source handed to the host [`AudioOutput`](bridge_traits::AudioOutput).
    pub fn render_source(&self) -> Arc<dyn RenderSource> {
        Arc::new(self.clone())
    }
}

impl RenderSource for SynthContext {
    fn render(&self, out: &mut [f32]) {
        out.fill(0.0);

        let mut state = self.state.lock();
        let start_time = state.frames_rendered as f64 / self.sample_rate as f64;
        if let Some(graph) = state.graph.as_mut() {
            graph.render(out, start_time, self.sample_rate as f64);
        }
        state.frames_rendered += out.len() as u64;
    }
}
