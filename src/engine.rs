//! [`Engine`]: drives a [`Graph`] through its lifecycle and the main loop
//! that advances the clock and cycles ready nodes until the run finishes.

use crate::context::{EngineContext, RunFor, RunMode};
use crate::error::Result;
use crate::graph::Graph;
use crate::node::Node;
use crate::time::Time;
use log::debug;
use std::rc::Rc;
use std::time::Instant;

/// Co-ordinates a [`Graph`]'s run: node lifecycle calls, then the
/// clock-advance/cycle loop, matched to `run_mode`/`run_for`.
pub struct Engine {
    graph: Graph,
    run_for: RunFor,
}

impl Engine {
    pub fn new(root_nodes: Vec<Rc<dyn Node>>, run_mode: RunMode, run_for: RunFor) -> Self {
        let ctx = EngineContext::new(run_mode);
        let graph = Graph::wire(root_nodes, ctx);
        Engine { graph, run_for }
    }

    /// Build an engine around a [`Graph`] that's already wired, e.g. one
    /// produced by a [`crate::builder::GraphBuilder`].
    pub fn from_graph(graph: Graph, run_for: RunFor) -> Self {
        Engine { graph, run_for }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Run `initialise` → `start` → the main loop → `stop`, in that order.
    pub fn run(&mut self) -> Result<()> {
        self.graph.initialise()?;
        self.graph.start()?;
        let result = self.run_loop();
        self.graph.stop()?;
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        let timer = Instant::now();
        let start_time = self.graph.ctx().start_time();
        let is_realtime = self.graph.ctx().run_mode() == RunMode::RealTime;
        let mut end_time = Time::MAX_DT;
        if let RunFor::Duration(d) = self.run_for {
            end_time = start_time + d;
        }
        let mut cycle: u32 = 0;
        loop {
            let elapsed = self.graph.ctx().elapsed();
            if self.run_for.done(cycle, elapsed) || self.graph.ctx().time() >= end_time {
                break;
            }
            let progressed = if is_realtime {
                self.advance_realtime(end_time)
            } else {
                self.advance_historical()
            };
            if !progressed {
                debug!("no further wakeups pending, stopping early");
                break;
            }
            self.graph.cycle()?;
            cycle += 1;
        }
        debug!("run finished after {:?}, {} cycles", timer.elapsed(), cycle);
        Ok(())
    }

    fn advance_historical(&mut self) -> bool {
        match self.graph.next_scheduled_time() {
            Some(next) => {
                self.graph.set_time(next);
                self.graph.process_due_wakeups()
            }
            None => false,
        }
    }

    fn advance_realtime(&mut self, end_time: Time) -> bool {
        let next = self.graph.next_scheduled_time().unwrap_or(Time::MAX_DT);
        let wait_until = next.min(end_time);
        while Time::now() < wait_until {
            std::thread::yield_now();
        }
        self.graph.set_time(Time::now());
        self.graph.process_due_wakeups()
    }
}
