//! End-to-end scenarios driving a whole engine run through real node graphs,
//! each checked against a specific documented output sequence.

#[cfg(test)]
mod tests {
    use crate::context::{EngineContext, RunFor, RunMode};
    use crate::engine::Engine;
    use crate::error::Result as EngineResult;
    use crate::node::{IntoNode, MutableNode, Node, NodeKind, NodeSignature, UpStreams};
    use crate::node_id::NodeId;
    use crate::scheduler::UNTAGGED;
    use crate::sources::PushSourceNode;
    use crate::time::Time;
    use crate::ts::dict::{new_dict_output, tsd_remove, tsd_set, DictDelta, DictOutputHandle, TsdInput};
    use crate::ts::scalar::ScalarInput;
    use crate::ts::set::{new_set_output, tss_add, tss_remove, SetOutputHandle, TssInput};
    use crate::ts::TimeSeries;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, VecDeque};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    fn init_logging() {
        let _ = env_logger::try_init();
    }

    /// A sink that records every value it sees, one per engine time it was woken.
    struct RecordingSink<T: Clone + 'static> {
        input: ScalarInput<T>,
        upstream: Rc<dyn Node>,
        history: Rc<RefCell<Vec<T>>>,
    }

    impl<T: Clone + 'static> MutableNode for RecordingSink<T> {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            if self.input.modified(ctx.time()) {
                self.history.borrow_mut().push(self.input.value());
            }
            Ok(true)
        }

        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.upstream.clone()], vec![])
        }

        fn start(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
            self.input.make_active();
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::Sink, "RecordingSink".to_string())
        }
    }

    /// 1. Scalar passthrough: a push source feeding a sink directly, `[1, 2]`
    /// in -> `[1, 2]` recorded.
    #[test]
    fn scalar_passthrough() {
        init_logging();
        let (source, sender) = PushSourceNode::<i32>::new(NodeId::ROOT.child(0));
        let output = source.output();
        let source_node: Rc<dyn Node> = source.into_node();

        let history = Rc::new(RefCell::new(Vec::new()));
        let mut input = ScalarInput::new(1); // sink is wired second, so its index is 1
        input.bind(output);
        let sink = RecordingSink {
            input,
            upstream: source_node.clone(),
            history: history.clone(),
        };

        sender.enqueue(Time::new(1), 1).unwrap();
        sender.enqueue(Time::new(2), 2).unwrap();

        let mut engine = Engine::new(
            vec![sink.into_node()],
            RunMode::Simulation { start: Time::ZERO },
            RunFor::Cycles(10),
        );
        engine.run().unwrap();

        assert_eq!(*history.borrow(), vec![1, 2]);
    }

    /// A node that routes a single `value` stream to one of two targets based
    /// on a boolean `condition`, forwarding the currently-selected target's
    /// history the moment either the value ticks or the route changes. A
    /// rerouted target immediately picks up whatever value is already current
    /// upstream, matching an ordinary scalar's retain-until-overwritten
    /// semantics instead of resetting on rebind.
    struct Router {
        condition: ScalarInput<bool>,
        value: ScalarInput<i32>,
        selected_is_a: Option<bool>,
        history_a: Rc<RefCell<Vec<i32>>>,
        history_b: Rc<RefCell<Vec<i32>>>,
        condition_node: Rc<dyn Node>,
        value_node: Rc<dyn Node>,
    }

    impl MutableNode for Router {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            let now = ctx.time();
            let mut rerouted = false;
            if self.condition.modified(now) {
                let selection = self.condition.value();
                if Some(selection) != self.selected_is_a {
                    self.selected_is_a = Some(selection);
                    rerouted = true;
                }
            }
            if (rerouted || self.value.modified(now)) && self.value.valid() {
                let v = self.value.value();
                match self.selected_is_a {
                    Some(true) => self.history_a.borrow_mut().push(v),
                    Some(false) => self.history_b.borrow_mut().push(v),
                    None => {}
                }
            }
            Ok(true)
        }

        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.condition_node.clone(), self.value_node.clone()], vec![])
        }

        fn start(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
            self.condition.make_active();
            self.value.make_active();
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::Sink, "Router".to_string())
        }
    }

    /// 2. Route by condition: `condition=[true,_,false,_]`, `value=[1,2,_,4]`
    /// -> targets observe `[{0:1},{0:2},{1:2},{1:4}]`, i.e. `history_a=[1,2]`,
    /// `history_b=[2,4]` (target b picks up the already-current value 2 the
    /// instant it's rerouted to, before value itself ticks again at 4).
    #[test]
    fn route_by_condition_rebinds_the_observer_between_two_producers() {
        init_logging();
        let (condition_src, condition_sender) = PushSourceNode::<bool>::new(NodeId::ROOT.child(0));
        let (value_src, value_sender) = PushSourceNode::<i32>::new(NodeId::ROOT.child(1));
        let condition_output = condition_src.output();
        let value_output = value_src.output();
        let condition_node: Rc<dyn Node> = condition_src.into_node();
        let value_node: Rc<dyn Node> = value_src.into_node();

        // condition_node and value_node are wired first (indices 0, 1), so
        // the router consuming both gets index 2.
        let mut condition = ScalarInput::new(2);
        condition.bind(condition_output);
        let mut value = ScalarInput::new(2);
        value.bind(value_output);

        let history_a = Rc::new(RefCell::new(Vec::new()));
        let history_b = Rc::new(RefCell::new(Vec::new()));
        let router = Router {
            condition,
            value,
            selected_is_a: None,
            history_a: history_a.clone(),
            history_b: history_b.clone(),
            condition_node,
            value_node,
        };

        condition_sender.enqueue(Time::new(1), true).unwrap();
        condition_sender.enqueue(Time::new(3), false).unwrap();
        value_sender.enqueue(Time::new(1), 1).unwrap();
        value_sender.enqueue(Time::new(2), 2).unwrap();
        value_sender.enqueue(Time::new(4), 4).unwrap();

        let mut engine = Engine::new(
            vec![router.into_node()],
            RunMode::Simulation { start: Time::ZERO },
            RunFor::Cycles(10),
        );
        engine.run().unwrap();

        assert_eq!(*history_a.borrow(), vec![1, 2]);
        assert_eq!(*history_b.borrow(), vec![2, 4]);
    }

    /// A node that merges two streams, chosen by an `index` selector, into a
    /// single recorded history. Rerouting to a stream that isn't ticking this
    /// instant still emits that stream's current value, same as `Router`.
    struct Merge {
        index: ScalarInput<u8>,
        ts1: ScalarInput<i32>,
        ts2: ScalarInput<i32>,
        selected: Option<u8>,
        history: Rc<RefCell<Vec<i32>>>,
        index_node: Rc<dyn Node>,
        ts1_node: Rc<dyn Node>,
        ts2_node: Rc<dyn Node>,
    }

    impl MutableNode for Merge {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            let now = ctx.time();
            let mut rerouted = false;
            if self.index.modified(now) {
                let selection = self.index.value();
                if Some(selection) != self.selected {
                    self.selected = Some(selection);
                    rerouted = true;
                }
            }
            let active_ticked = match self.selected {
                Some(0) => self.ts1.modified(now),
                Some(1) => self.ts2.modified(now),
                _ => false,
            };
            if rerouted || active_ticked {
                let v = match self.selected {
                    Some(0) if self.ts1.valid() => Some(self.ts1.value()),
                    Some(1) if self.ts2.valid() => Some(self.ts2.value()),
                    _ => None,
                };
                if let Some(v) = v {
                    self.history.borrow_mut().push(v);
                }
            }
            Ok(true)
        }

        fn upstreams(&self) -> UpStreams {
            UpStreams::new(
                vec![self.index_node.clone(), self.ts1_node.clone(), self.ts2_node.clone()],
                vec![],
            )
        }

        fn start(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
            self.index.make_active();
            self.ts1.make_active();
            self.ts2.make_active();
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::Sink, "Merge".to_string())
        }
    }

    /// 3. Merge of two streams via index: `index=[0,_,1,_]`, `ts1=[1,2,_,4]`,
    /// `ts2=[-1,-2,_,-4]` -> observed `[1,2,-2,-4]`.
    #[test]
    fn merge_via_index_rebinds_a_single_observer_across_two_producers() {
        init_logging();
        let (index_src, index_sender) = PushSourceNode::<u8>::new(NodeId::ROOT.child(0));
        let (ts1_src, ts1_sender) = PushSourceNode::<i32>::new(NodeId::ROOT.child(1));
        let (ts2_src, ts2_sender) = PushSourceNode::<i32>::new(NodeId::ROOT.child(2));
        let index_output = index_src.output();
        let ts1_output = ts1_src.output();
        let ts2_output = ts2_src.output();
        let index_node: Rc<dyn Node> = index_src.into_node();
        let ts1_node: Rc<dyn Node> = ts1_src.into_node();
        let ts2_node: Rc<dyn Node> = ts2_src.into_node();

        // three leaf sources wired first (indices 0, 1, 2), merge gets index 3.
        let mut index = ScalarInput::new(3);
        index.bind(index_output);
        let mut ts1 = ScalarInput::new(3);
        ts1.bind(ts1_output);
        let mut ts2 = ScalarInput::new(3);
        ts2.bind(ts2_output);

        let history = Rc::new(RefCell::new(Vec::new()));
        let merge = Merge {
            index,
            ts1,
            ts2,
            selected: None,
            history: history.clone(),
            index_node,
            ts1_node,
            ts2_node,
        };

        index_sender.enqueue(Time::new(1), 0).unwrap();
        index_sender.enqueue(Time::new(3), 1).unwrap();
        ts1_sender.enqueue(Time::new(1), 1).unwrap();
        ts1_sender.enqueue(Time::new(2), 2).unwrap();
        ts2_sender.enqueue(Time::new(2), -2).unwrap();
        ts2_sender.enqueue(Time::new(4), -4).unwrap();

        let mut engine = Engine::new(
            vec![merge.into_node()],
            RunMode::Simulation { start: Time::ZERO },
            RunFor::Cycles(10),
        );
        engine.run().unwrap();

        assert_eq!(*history.borrow(), vec![1, 2, -2, -4]);
    }

    #[derive(Clone)]
    enum SetOp {
        Add(i32),
        Remove(i32),
    }

    /// A push-driven source that applies queued set mutations directly to its
    /// own `TssOutput`, in the same drain-then-reschedule shape as
    /// `sources::PushSourceNode`.
    struct SetSource {
        set: SetOutputHandle<i32>,
        queue: Arc<Mutex<VecDeque<(Time, SetOp)>>>,
    }

    struct SetSender {
        queue: Arc<Mutex<VecDeque<(Time, SetOp)>>>,
    }

    impl SetSender {
        fn enqueue(&self, time: Time, op: SetOp) {
            self.queue.lock().unwrap().push_back((time, op));
        }
    }

    impl SetSource {
        fn new() -> (Self, SetSender) {
            let queue = Arc::new(Mutex::new(VecDeque::new()));
            (
                Self {
                    set: new_set_output(),
                    queue: queue.clone(),
                },
                SetSender { queue },
            )
        }

        fn output(&self) -> SetOutputHandle<i32> {
            self.set.clone()
        }

        fn earliest_queued(&self) -> Option<Time> {
            self.queue.lock().unwrap().front().map(|(t, _)| *t)
        }
    }

    impl MutableNode for SetSource {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            let now = ctx.time();
            let mut ticked = false;
            loop {
                let due = {
                    let mut q = self.queue.lock().unwrap();
                    match q.front() {
                        Some((t, _)) if *t <= now => q.pop_front(),
                        _ => None,
                    }
                };
                match due {
                    Some((_, SetOp::Add(v))) => {
                        tss_add(&self.set, v, ctx);
                        ticked = true;
                    }
                    Some((_, SetOp::Remove(v))) => {
                        tss_remove(&self.set, &v, ctx);
                        ticked = true;
                    }
                    None => break,
                }
            }
            if let Some(next) = self.earliest_queued() {
                ctx.schedule_self(UNTAGGED, next);
            }
            Ok(ticked)
        }

        fn start(&mut self, ctx: &mut EngineContext) -> EngineResult<()> {
            if let Some(next) = self.earliest_queued() {
                ctx.schedule_self(UNTAGGED, next);
            }
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::PushSource, "SetSource".to_string())
        }
    }

    /// A sink recording a `contains` query against one item, pushing only
    /// when the query's own answer changes (not on every set mutation).
    struct ContainsQuery {
        set: TssInput<i32>,
        item: i32,
        last: Option<bool>,
        history: Rc<RefCell<Vec<bool>>>,
        upstream: Rc<dyn Node>,
    }

    impl MutableNode for ContainsQuery {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            if self.set.modified(ctx.time()) {
                let v = self.set.contains(&self.item);
                if Some(v) != self.last {
                    self.last = Some(v);
                    self.history.borrow_mut().push(v);
                }
            }
            Ok(true)
        }

        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.upstream.clone()], vec![])
        }

        fn start(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
            self.set.make_active();
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::Sink, "ContainsQuery".to_string())
        }
    }

    /// 4. TSS route + contains: `tss=[{add 1},{add 2},_,{remove 2}]`, queried
    /// on item 2 then item 1 -> item 2's answer changes `[false,true,_,false]`
    /// (recorded only on change: `[false,true,false]`), item 1's answer only
    /// ever becomes `true`, once, and stays that way.
    #[test]
    fn tss_route_and_contains() {
        init_logging();
        let (set_src, set_sender) = SetSource::new();
        let set_output = set_src.output();
        let set_node: Rc<dyn Node> = set_src.into_node();

        // set_node is wired first (index 0); query2 second (index 1), query1
        // third (index 2) since root_nodes lists query2 before query1.
        let mut query2_input = TssInput::new(1);
        query2_input.bind(set_output.clone());
        let history2 = Rc::new(RefCell::new(Vec::new()));
        let query2 = ContainsQuery {
            set: query2_input,
            item: 2,
            last: None,
            history: history2.clone(),
            upstream: set_node.clone(),
        };

        let mut query1_input = TssInput::new(2);
        query1_input.bind(set_output);
        let history1 = Rc::new(RefCell::new(Vec::new()));
        let query1 = ContainsQuery {
            set: query1_input,
            item: 1,
            last: None,
            history: history1.clone(),
            upstream: set_node,
        };

        set_sender.enqueue(Time::new(1), SetOp::Add(1));
        set_sender.enqueue(Time::new(2), SetOp::Add(2));
        set_sender.enqueue(Time::new(4), SetOp::Remove(2));

        let mut engine = Engine::new(
            vec![query2.into_node(), query1.into_node()],
            RunMode::Simulation { start: Time::ZERO },
            RunFor::Cycles(10),
        );
        engine.run().unwrap();

        assert_eq!(*history2.borrow(), vec![false, true, false]);
        assert_eq!(*history1.borrow(), vec![true]);
    }

    #[derive(Clone)]
    enum DictOp {
        Set(i32, i32),
        Remove(i32),
    }

    /// A push-driven source that applies queued dict mutations directly to
    /// its own `TsdOutput`.
    struct DictSource {
        dict: DictOutputHandle<i32, i32>,
        queue: Arc<Mutex<VecDeque<(Time, DictOp)>>>,
    }

    struct DictSender {
        queue: Arc<Mutex<VecDeque<(Time, DictOp)>>>,
    }

    impl DictSender {
        fn enqueue(&self, time: Time, op: DictOp) {
            self.queue.lock().unwrap().push_back((time, op));
        }
    }

    impl DictSource {
        fn new() -> (Self, DictSender) {
            let queue = Arc::new(Mutex::new(VecDeque::new()));
            (
                Self {
                    dict: new_dict_output(),
                    queue: queue.clone(),
                },
                DictSender { queue },
            )
        }

        fn output(&self) -> DictOutputHandle<i32, i32> {
            self.dict.clone()
        }

        fn earliest_queued(&self) -> Option<Time> {
            self.queue.lock().unwrap().front().map(|(t, _)| *t)
        }
    }

    impl MutableNode for DictSource {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            let now = ctx.time();
            let mut ticked = false;
            loop {
                let due = {
                    let mut q = self.queue.lock().unwrap();
                    match q.front() {
                        Some((t, _)) if *t <= now => q.pop_front(),
                        _ => None,
                    }
                };
                match due {
                    Some((_, DictOp::Set(k, v))) => {
                        tsd_set(&self.dict, k, v, ctx);
                        ticked = true;
                    }
                    Some((_, DictOp::Remove(k))) => {
                        tsd_remove(&self.dict, &k, NodeId::ROOT, ctx).unwrap();
                        ticked = true;
                    }
                    None => break,
                }
            }
            if let Some(next) = self.earliest_queued() {
                ctx.schedule_self(UNTAGGED, next);
            }
            Ok(ticked)
        }

        fn start(&mut self, ctx: &mut EngineContext) -> EngineResult<()> {
            if let Some(next) = self.earliest_queued() {
                ctx.schedule_self(UNTAGGED, next);
            }
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::PushSource, "DictSource".to_string())
        }
    }

    /// A node merging two dicts by key: a removal on either side only drops
    /// the merged entry if the other side doesn't still hold that key.
    struct DictMerge {
        left: TsdInput<i32, i32>,
        right: TsdInput<i32, i32>,
        output: DictOutputHandle<i32, i32>,
        left_node: Rc<dyn Node>,
        right_node: Rc<dyn Node>,
    }

    impl MutableNode for DictMerge {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            let now = ctx.time();
            for (k, delta) in self.left.delta_value(now) {
                match delta {
                    DictDelta::Value(v) => tsd_set(&self.output, k, v, ctx),
                    DictDelta::Remove => {
                        if !self.right.contains_key(&k) {
                            tsd_remove(&self.output, &k, NodeId::ROOT, ctx).unwrap();
                        }
                    }
                }
            }
            for (k, delta) in self.right.delta_value(now) {
                match delta {
                    DictDelta::Value(v) => tsd_set(&self.output, k, v, ctx),
                    DictDelta::Remove => {
                        if !self.left.contains_key(&k) {
                            tsd_remove(&self.output, &k, NodeId::ROOT, ctx).unwrap();
                        }
                    }
                }
            }
            Ok(true)
        }

        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.left_node.clone(), self.right_node.clone()], vec![])
        }

        fn start(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
            self.left.make_active();
            self.right.make_active();
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::Compute, "DictMerge".to_string())
        }
    }

    /// A sink that snapshots a dict's whole valid-children view whenever it
    /// ticks.
    struct DictSnapshotSink {
        input: TsdInput<i32, i32>,
        upstream: Rc<dyn Node>,
        history: Rc<RefCell<Vec<BTreeMap<i32, i32>>>>,
    }

    impl MutableNode for DictSnapshotSink {
        fn cycle(&mut self, ctx: &mut EngineContext) -> EngineResult<bool> {
            if self.input.modified(ctx.time()) {
                let snap: BTreeMap<i32, i32> = self.input.value().into_iter().collect();
                self.history.borrow_mut().push(snap);
            }
            Ok(true)
        }

        fn upstreams(&self) -> UpStreams {
            UpStreams::new(vec![self.upstream.clone()], vec![])
        }

        fn start(&mut self, _ctx: &mut EngineContext) -> EngineResult<()> {
            self.input.make_active();
            Ok(())
        }

        fn signature(&self) -> NodeSignature {
            NodeSignature::new(NodeKind::Sink, "DictSnapshotSink".to_string())
        }
    }

    /// 5. TSD merge: two dict sources merged by key, where a remove on either
    /// side only drops the merged entry if the other side doesn't still hold
    /// it. The merge only emits a snapshot when the merged view itself
    /// actually changes, so tick 4 (left removes key 1, right still holds it)
    /// produces no new snapshot.
    #[test]
    fn tsd_merge_with_remove_semantics() {
        init_logging();
        let (left_src, left_sender) = DictSource::new();
        let (right_src, right_sender) = DictSource::new();
        let left_output = left_src.output();
        let right_output = right_src.output();
        let left_node: Rc<dyn Node> = left_src.into_node();
        let right_node: Rc<dyn Node> = right_src.into_node();

        // left_node (0), right_node (1) wired first, then merge (2), then
        // the snapshot sink (3).
        let mut left = TsdInput::new(2);
        left.bind(left_output);
        let mut right = TsdInput::new(2);
        right.bind(right_output);

        let merge_output = new_dict_output::<i32, i32>();
        let merge = DictMerge {
            left,
            right,
            output: merge_output.clone(),
            left_node,
            right_node,
        };
        let merge_node: Rc<dyn Node> = merge.into_node();

        let mut snapshot_input = TsdInput::new(3);
        snapshot_input.bind(merge_output);
        let history = Rc::new(RefCell::new(Vec::new()));
        let sink = DictSnapshotSink {
            input: snapshot_input,
            upstream: merge_node,
            history: history.clone(),
        };

        left_sender.enqueue(Time::new(1), DictOp::Set(1, 1));
        left_sender.enqueue(Time::new(2), DictOp::Set(2, 2));
        right_sender.enqueue(Time::new(2), DictOp::Set(1, -1));
        right_sender.enqueue(Time::new(3), DictOp::Set(-2, -2));
        left_sender.enqueue(Time::new(4), DictOp::Remove(1));
        right_sender.enqueue(Time::new(5), DictOp::Remove(1));

        let mut engine = Engine::new(
            vec![sink.into_node()],
            RunMode::Simulation { start: Time::ZERO },
            RunFor::Cycles(10),
        );
        engine.run().unwrap();

        let snaps = history.borrow();
        assert_eq!(snaps.len(), 4);
        assert_eq!(snaps[0], BTreeMap::from([(1, 1)]));
        assert_eq!(snaps[1], BTreeMap::from([(1, -1), (2, 2)]));
        assert_eq!(snaps[2], BTreeMap::from([(1, -1), (2, 2), (-2, -2)]));
        assert_eq!(snaps[3], BTreeMap::from([(2, 2), (-2, -2)]));
    }

    /// 6. Push source: values enqueued from outside the graph arrive at
    /// their due time and the engine terminates once the queue drains and
    /// `RunFor` is satisfied. Covered in more granular form by
    /// `sources::tests`; this exercises it through the full `Engine`.
    #[test]
    fn push_source_through_a_full_run() {
        init_logging();
        let (source, sender) = PushSourceNode::<i32>::new(NodeId::ROOT.child(0));
        let output = source.output();
        sender.enqueue(Time::new(1), 10).unwrap();
        sender.enqueue(Time::new(2), 20).unwrap();
        sender.enqueue(Time::new(3), 30).unwrap();

        let mut engine = Engine::new(
            vec![source.into_node()],
            RunMode::Simulation { start: Time::ZERO },
            RunFor::Duration(std::time::Duration::from_nanos(5)),
        );
        engine.run().unwrap();

        assert_eq!(*output.borrow().value(), 30);
    }
}
