//! Ordered directed graphs and the handful of algorithms the compiler needs.
//!
//! Vertices live in `BTreeMap`s so every traversal is deterministic given the
//! vertex ordering; analysis passes rely on that for stable ids and names.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph<V: Ord + Clone> {
    edges: BTreeMap<V, BTreeSet<V>>,
}

impl<V: Ord + Clone> Default for Graph<V> {
    fn default() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }
}

impl<V: Ord + Clone> Graph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, v: V) {
        self.edges.entry(v).or_default();
    }

    /// Add `from -> to`, creating both vertices as needed.
    pub fn add_edge(&mut self, from: V, to: V) {
        self.add_node(to.clone());
        self.edges.entry(from).or_default().insert(to);
    }

    pub fn contains(&self, v: &V) -> bool {
        self.edges.contains_key(v)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &V> {
        self.edges.keys()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Direct successors of `v`.
    pub fn connected(&self, v: &V) -> impl Iterator<Item = &V> {
        self.edges.get(v).into_iter().flat_map(|s| s.iter())
    }

    /// Vertices with no incoming edge.
    pub fn heads(&self) -> BTreeSet<V> {
        let mut heads: BTreeSet<V> = self.edges.keys().cloned().collect();
        for targets in self.edges.values() {
            for t in targets {
                heads.remove(t);
            }
        }
        heads
    }

    /// Same vertices, every edge reversed.
    pub fn transpose(&self) -> Graph<V> {
        let mut out = Graph::new();
        for (from, targets) in &self.edges {
            out.add_node(from.clone());
            for to in targets {
                out.add_edge(to.clone(), from.clone());
            }
        }
        out
    }

    /// Induced subgraph over `keep`.
    pub fn subgraph(&self, keep: &BTreeSet<V>) -> Graph<V> {
        let mut out = Graph::new();
        for v in keep {
            if !self.contains(v) {
                continue;
            }
            out.add_node(v.clone());
            for to in self.connected(v) {
                if keep.contains(to) {
                    out.add_edge(v.clone(), to.clone());
                }
            }
        }
        out
    }

    /// Every vertex reachable from `starts` by one or more edges.
    ///
    /// A start vertex is included only if it is reachable from some start.
    pub fn collect_all_connected<'a>(&self, starts: impl IntoIterator<Item = &'a V>) -> BTreeSet<V>
    where
        V: 'a,
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<V> = Vec::new();
        for s in starts {
            stack.extend(self.connected(s).cloned());
        }
        while let Some(v) = stack.pop() {
            if seen.insert(v.clone()) {
                stack.extend(self.connected(&v).cloned());
            }
        }
        seen
    }

    /// Depth-first post-order: every vertex appears after all of its successors.
    ///
    /// Roots are visited in vertex order. Cycles are tolerated (the back edge is
    /// ignored) so callers can verify acyclicity separately.
    pub fn sort_post_order(&self) -> Vec<V> {
        let mut visited = BTreeSet::new();
        let mut out = Vec::with_capacity(self.edges.len());
        for root in self.edges.keys() {
            if visited.contains(root) {
                continue;
            }
            visited.insert(root.clone());
            // (vertex, successors not yet expanded)
            let mut stack: Vec<(V, Vec<V>)> = vec![(root.clone(), self.pending(root))];
            while let Some((_, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(next) => {
                        if visited.insert(next.clone()) {
                            let succ = self.pending(&next);
                            stack.push((next, succ));
                        }
                    }
                    None => {
                        if let Some((v, _)) = stack.pop() {
                            out.push(v);
                        }
                    }
                }
            }
        }
        out
    }

    // Successors reversed so that popping yields them in ascending order.
    fn pending(&self, v: &V) -> Vec<V> {
        let mut succ: Vec<V> = self.connected(v).cloned().collect();
        succ.reverse();
        succ
    }

    /// True if some vertex can reach itself.
    pub fn has_cycle(&self) -> bool {
        let order = self.sort_post_order();
        let position: BTreeMap<&V, usize> = order.iter().enumerate().map(|(i, v)| (v, i)).collect();
        // In a DAG every edge points to a vertex emitted earlier.
        self.edges.iter().any(|(from, targets)| {
            targets
                .iter()
                .any(|to| position.get(to) >= position.get(from))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Graph<u32> {
        let mut g = Graph::new();
        g.add_edge(1, 2);
        g.add_edge(1, 3);
        g.add_edge(2, 4);
        g.add_edge(3, 4);
        g
    }

    #[test]
    fn post_order_emits_successors_first() {
        let order = diamond().sort_post_order();
        assert_eq!(order, vec![4, 2, 3, 1]);
    }

    #[test]
    fn transpose_reverses_edges() {
        let t = diamond().transpose();
        assert_eq!(t.connected(&4).cloned().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(t.heads(), BTreeSet::from([4]));
        assert_eq!(t.sort_post_order(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn connected_excludes_unreached_start() {
        let g = diamond();
        assert_eq!(g.collect_all_connected(&[2]), BTreeSet::from([4]));
        assert_eq!(g.collect_all_connected(&[1]), BTreeSet::from([2, 3, 4]));
    }

    #[test]
    fn detects_cycles() {
        let mut g = diamond();
        assert!(!g.has_cycle());
        g.add_edge(4, 1);
        assert!(g.has_cycle());
    }
}
