//! Prefix tree over the configurations of one wave function.
//!
//! Each node represents a matched prefix `cfg[0..depth)` and has one child per
//! occupation of the next orbital. Leaves carry the rank of the configuration in
//! the wave function's ordered list. The enumerator walks the tree alongside its
//! nested orbital loops, so every loop level extends the node of the level above
//! by one orbital instead of descending from the root again.

use crate::configuration::Configuration;

/// Handle to a node of a [`ConfigurationIndex`]. Only meaningful for the index
/// that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(u32);

#[derive(Clone, Debug, Default)]
struct Node {
    children: [Option<NodeId>; 3],
    rank: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ConfigurationIndex {
    nodes: Vec<Node>,
}

impl Default for ConfigurationIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationIndex {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Inserts a configuration under the given rank. Returns the rank it was
    /// previously stored under, if any; the stored rank is left unchanged in that
    /// case.
    pub fn insert(&mut self, configuration: &Configuration, rank: usize) -> Option<usize> {
        let mut node = self.root();
        for &occupation in configuration.occupations() {
            let slot = occupation as usize;
            node = match self.nodes[node.0 as usize].children[slot] {
                Some(child) => child,
                None => {
                    let child = NodeId(self.nodes.len() as u32);
                    self.nodes.push(Node::default());
                    self.nodes[node.0 as usize].children[slot] = Some(child);
                    child
                }
            };
        }

        let leaf = &mut self.nodes[node.0 as usize];
        match leaf.rank {
            Some(previous) => Some(previous),
            None => {
                leaf.rank = Some(rank);
                None
            }
        }
    }

    /// Descends from the root along `configuration[0..depth)`.
    pub fn search_from_root(&self, depth: usize, configuration: &Configuration) -> Option<NodeId> {
        (0..depth).try_fold(self.root(), |node, orbital| {
            self.increment_node(orbital, configuration, node)
        })
    }

    /// Extends a node matching `configuration[0..orbital)` by `configuration[orbital]`.
    #[inline]
    pub fn increment_node(
        &self,
        orbital: usize,
        configuration: &Configuration,
        node: NodeId,
    ) -> Option<NodeId> {
        self.nodes[node.0 as usize].children[configuration[orbital] as usize]
    }

    /// Resolves a configuration to its rank, starting from a node that already
    /// matches `configuration[0..orbital)`.
    pub fn find_position(
        &self,
        orbital: usize,
        configuration: &Configuration,
        node: NodeId,
    ) -> Option<usize> {
        let leaf = (orbital..configuration.len()).try_fold(node, |node, orbital| {
            self.increment_node(orbital, configuration, node)
        })?;
        self.nodes[leaf.0 as usize].rank
    }

    pub fn find(&self, configuration: &Configuration) -> Option<usize> {
        self.find_position(0, configuration, self.root())
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigurationIndex;
    use crate::configuration::Configuration;

    fn index(configurations: &[&str]) -> ConfigurationIndex {
        let mut index = ConfigurationIndex::new();
        for (rank, configuration) in configurations.iter().enumerate() {
            assert_eq!(index.insert(&configuration.parse().unwrap(), rank), None);
        }
        index
    }

    #[test]
    fn find_resolves_ranks() {
        let index = index(&["2200", "2110", "1210", "0220"]);
        let lookup = |s: &str| index.find(&s.parse::<Configuration>().unwrap());

        assert_eq!(lookup("2200"), Some(0));
        assert_eq!(lookup("1210"), Some(2));
        assert_eq!(lookup("0220"), Some(3));
        assert_eq!(lookup("2020"), None);
    }

    #[test]
    fn duplicate_insert_keeps_first_rank() {
        let mut index = index(&["2110"]);
        assert_eq!(index.insert(&"2110".parse().unwrap(), 7), Some(0));
        assert_eq!(index.find(&"2110".parse().unwrap()), Some(0));
    }

    #[test]
    fn incremental_descent_matches_root_descent() {
        let index = index(&["2200", "2110", "2101", "2011"]);
        let target: Configuration = "2101".parse().unwrap();

        let mut node = index.search_from_root(1, &target).unwrap();
        for orbital in 1..3 {
            assert_eq!(Some(node), index.search_from_root(orbital, &target));
            node = index.increment_node(orbital, &target, node).unwrap();
        }
        assert_eq!(index.find_position(3, &target, node), Some(2));
    }

    #[test]
    fn missing_prefix_is_none() {
        let index = index(&["2200", "2110"]);
        let probe: Configuration = "0200".parse().unwrap();
        assert_eq!(index.search_from_root(1, &probe), None);
        assert_eq!(index.search_from_root(0, &probe), Some(index.root()));
    }
}
