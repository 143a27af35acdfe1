//! Bin: a named grouping of elements for lifecycle management. A bin owns no
//! pads of its own; it exists so an application can add a cluster of
//! elements (say, a TLS stack plus its framing codec) and tear the whole
//! thing down with one call instead of tracking every `ElementId` itself.

use crate::element::{ElementId, Graph};

#[derive(Debug, Default)]
pub struct Bin {
    name: String,
    members: Vec<ElementId>,
}

impl Bin {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, id: ElementId) {
        self.members.push(id);
    }

    #[must_use]
    pub fn members(&self) -> &[ElementId] {
        &self.members
    }

    /// Destroys every member still alive in `graph`, in insertion order.
    pub fn destroy_all(&mut self, graph: &mut Graph) {
        for id in self.members.drain(..) {
            if graph.is_alive(id) {
                graph.destroy(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Collector;

    #[test]
    fn destroy_all_removes_every_member() {
        let mut graph = Graph::new();
        let mut bin = Bin::new("stage");
        let a = graph.insert(Box::new(Collector::new("a", |_| {})));
        let b = graph.insert(Box::new(Collector::new("b", |_| {})));
        bin.add(a);
        bin.add(b);

        bin.destroy_all(&mut graph);

        assert!(!graph.is_alive(a));
        assert!(!graph.is_alive(b));
        assert!(bin.members().is_empty());
    }
}
