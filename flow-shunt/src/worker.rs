//! Generic worker-thread shunt: hands each input packet to a user-supplied
//! blocking closure on a dedicated thread and forwards whatever it returns
//! to the output pad. This is the escape hatch for I/O the other shunt
//! kinds don't model directly — a blocking library call, a CPU-bound
//! transform too slow for the pipeline thread, or a resource with no file
//! descriptor at all.

use bytes::Bytes;
use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;

use crate::shunt::ShuntMsg;

enum WorkerCmd {
    Process(Bytes),
}

pub struct WorkerShunt {
    core: ElementCore,
    rx: flume::Receiver<ShuntMsg>,
    cmd_tx: flume::Sender<WorkerCmd>,
}

impl std::fmt::Debug for WorkerShunt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerShunt").field("name", &self.core.name).finish()
    }
}

impl WorkerShunt {
    /// Spawns a worker thread that runs `work` once per input buffer
    /// packet, forwarding its `Bytes` result downstream. `work` returning
    /// `None` drops the input silently (a filter) rather than emitting
    /// anything.
    pub fn spawn(
        name: impl Into<String>,
        mut work: impl FnMut(Bytes) -> Option<Bytes> + Send + 'static,
    ) -> Self {
        let (msg_tx, msg_rx) = flume::unbounded();
        let (cmd_tx, cmd_rx) = flume::unbounded::<WorkerCmd>();

        std::thread::Builder::new()
            .name("flow-worker-shunt".into())
            .spawn(move || {
                while let Ok(WorkerCmd::Process(data)) = cmd_rx.recv() {
                    if let Some(out) = work(data) {
                        let _ = msg_tx.send(ShuntMsg::Data(out));
                    }
                }
            })
            .expect("failed to spawn flow-shunt worker thread");

        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();
        Self { core, rx: msg_rx, cmd_tx }
    }
}

impl ElementObject for WorkerShunt {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            if let Some(data) = packet.into_buffer() {
                let _ = self.cmd_tx.send(WorkerCmd::Process(data));
            }
        }
    }
    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(packet) = msg.into_packet() {
                graph.push_output(PadRef::output(me, 0), packet);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::element::Graph;
    use std::sync::{Arc, Mutex};

    #[test]
    fn worker_shunt_round_trips_through_its_thread() {
        let mut graph = Graph::new();
        let worker = graph.insert(Box::new(WorkerShunt::spawn("upper", |data| {
            Some(Bytes::from(String::from_utf8_lossy(&data).to_uppercase().into_bytes()))
        })));
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        let sink = graph.insert(Box::new(flow_core::elements::Collector::new("sink", move |p| {
            if let Some(b) = p.into_buffer() {
                r.lock().unwrap().push(b);
            }
        })));
        graph.connect(PadRef::output(worker, 0), PadRef::input(sink, 0));

        graph.push_input(PadRef::input(worker, 0), Packet::buffer(Bytes::from_static(b"hi")));

        // The worker thread is asynchronous; give it a moment, then pump.
        std::thread::sleep(std::time::Duration::from_millis(50));
        graph.pump(worker);

        assert_eq!(received.lock().unwrap().as_slice(), [Bytes::from_static(b"HI")]);
    }
}
