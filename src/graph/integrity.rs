use crate::graph::{Graph, GraphError, Node, Result};

impl Graph {
    /// Checking if the graph structure is correct:
    /// - node `k` has id `k` and is indexed under its bit
    /// - fanins point at existing nodes, exactly as many as the gate reads
    /// - the combinational part is acyclic.
    ///
    /// Run on every graph once its loops are broken, right before it is encoded.
    pub fn check_integrity(&self) -> Result<()> {
        for (k, node) in self.nodes.iter().enumerate() {
            if node.id != k {
                return Err(GraphError::InvalidState(format!(
                    "node stored at {} has id {}",
                    k, node.id
                )));
            }
            if self.index.get(&node.bit) != Some(&k) {
                return Err(GraphError::InvalidState(format!(
                    "node {} is not indexed under its bit",
                    k
                )));
            }
            self.check_node_integrity(node)?;
        }

        if self.index.len() != self.nodes.len() {
            return Err(GraphError::InvalidState(
                "index and node list disagree".to_string(),
            ));
        }

        // Checks for acyclicity
        self.topological_sort()?;

        Ok(())
    }

    fn check_node_integrity(&self, node: &Node) -> Result<()> {
        let fanins = node.get_fanins();
        if fanins.len() != node.kind.arity() {
            return Err(GraphError::FaninCount(
                node.id,
                node.kind.arity(),
                fanins.len(),
            ));
        }
        // Used slots come first
        if node.fanins[fanins.len()..].iter().any(Option::is_some) {
            return Err(GraphError::InvalidState(format!(
                "node {} has a gap in its fanins",
                node.id
            )));
        }
        match fanins.into_iter().find(|&f| f >= self.nodes.len()) {
            Some(missing) => Err(GraphError::InvalidState(format!(
                "node {} reads node {} which is not in the graph",
                node.id, missing
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::design::{SigBit, WireId};
    use crate::graph::{GateKind, Graph};

    #[test]
    fn check_integrity_test() {
        let bit = |i| SigBit::wire(WireId(i), 0);
        let mut g = Graph::new();
        let a = g.reference(bit(0));
        let b = g.reference(bit(1));
        let y = g.upsert(bit(2), GateKind::Or, &[a, b]).unwrap();
        assert!(g.check_integrity().is_ok());

        g.node_mut(y).fanins[1] = None;
        assert!(g.check_integrity().is_err());
        g.node_mut(y).fanins[1] = Some(b);

        // A combinational loop
        g.upsert(bit(0), GateKind::Buf, &[y]).unwrap();
        assert!(g.check_integrity().is_err());
    }
}
