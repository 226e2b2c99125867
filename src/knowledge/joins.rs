//! Foreign-key graph over catalog tables.
//!
//! Each registered join key becomes a pair of directed edges so paths can
//! be walked from either side. Paths are shortest by hop count (BFS).

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use super::catalog::Catalog;
use super::error::KnowledgeError;

/// One hop: `to_table` joins onto `from_table` with `from_column = to_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinStep {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

#[derive(Debug, Clone)]
struct KeyEdge {
    from_column: String,
    to_column: String,
}

struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    graph: DiGraph<String, KeyEdge>,
    nodes: HashMap<String, NodeIndex>,
}

impl JoinGraph {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for table in &catalog.tables {
            let idx = graph.add_node(table.name.clone());
            nodes.insert(table.name.clone(), idx);
        }

        for key in &catalog.joins {
            let (Some(&left), Some(&right)) = (nodes.get(&key.left), nodes.get(&key.right)) else {
                continue;
            };
            graph.add_edge(
                left,
                right,
                KeyEdge {
                    from_column: key.left_column.clone(),
                    to_column: key.right_column.clone(),
                },
            );
            graph.add_edge(
                right,
                left,
                KeyEdge {
                    from_column: key.right_column.clone(),
                    to_column: key.left_column.clone(),
                },
            );
        }

        Self { graph, nodes }
    }

    fn index(&self, table: &str) -> Result<NodeIndex, KnowledgeError> {
        self.nodes
            .get(table)
            .copied()
            .ok_or_else(|| KnowledgeError::UnknownTable(table.into()))
    }

    /// Shortest join path from one table to another.
    pub fn find_path(&self, from: &str, to: &str) -> Result<Vec<JoinStep>, KnowledgeError> {
        let from_idx = self.index(from)?;
        let to_idx = self.index(to)?;
        if from_idx == to_idx {
            return Ok(Vec::new());
        }

        let parents = self.bfs(from_idx);
        if !parents.contains_key(&to_idx) {
            return Err(KnowledgeError::NoPath {
                from: from.into(),
                to: to.into(),
            });
        }
        Ok(self.reconstruct_path(from_idx, to_idx, &parents))
    }

    /// Edges needed to reach every target from `root`, each table joined
    /// once and always after the table it hangs off.
    pub fn find_join_tree(
        &self,
        root: &str,
        targets: &[&str],
    ) -> Result<Vec<JoinStep>, KnowledgeError> {
        let root_idx = self.index(root)?;
        let parents = self.bfs(root_idx);

        let mut steps = Vec::new();
        let mut joined: HashSet<String> = HashSet::new();
        joined.insert(root.to_string());

        for target in targets {
            let target_idx = self.index(target)?;
            if target_idx == root_idx {
                continue;
            }
            if !parents.contains_key(&target_idx) {
                return Err(KnowledgeError::NoPath {
                    from: root.into(),
                    to: (*target).into(),
                });
            }
            for step in self.reconstruct_path(root_idx, target_idx, &parents) {
                if joined.insert(step.to_table.clone()) {
                    steps.push(step);
                }
            }
        }

        Ok(steps)
    }

    pub fn has_path(&self, from: &str, to: &str) -> bool {
        self.find_path(from, to).is_ok()
    }

    fn bfs(&self, start: NodeIndex) -> HashMap<NodeIndex, ParentInfo> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            // Sorted by target name so the chosen path does not depend on
            // edge insertion order.
            let mut edges: Vec<_> = self.graph.edges(current).collect();
            edges.sort_by(|a, b| self.graph[a.target()].cmp(&self.graph[b.target()]));

            for edge_ref in edges {
                let neighbor = edge_ref.target();
                if !visited.insert(neighbor) {
                    continue;
                }
                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx: edge_ref.id(),
                    },
                );
                queue.push_back(neighbor);
            }
        }

        parents
    }

    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> Vec<JoinStep> {
        let mut steps = Vec::new();
        let mut current = to_idx;

        while current != from_idx {
            let Some(info) = parents.get(&current) else {
                break;
            };
            let edge = &self.graph[info.edge_idx];
            steps.push(JoinStep {
                from_table: self.graph[info.parent].clone(),
                from_column: edge.from_column.clone(),
                to_table: self.graph[current].clone(),
                to_column: edge.to_column.clone(),
            });
            current = info.parent;
        }

        steps.reverse();
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> JoinGraph {
        JoinGraph::from_catalog(&Catalog::gaming().unwrap())
    }

    #[test]
    fn test_direct_join() {
        let path = graph().find_path("tbl_Deposits", "tbl_Players").unwrap();
        assert_eq!(
            path,
            vec![JoinStep {
                from_table: "tbl_Deposits".into(),
                from_column: "PlayerID".into(),
                to_table: "tbl_Players".into(),
                to_column: "PlayerID".into(),
            }]
        );
    }

    #[test]
    fn test_reverse_direction() {
        let path = graph().find_path("tbl_Players", "tbl_Deposits").unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].from_column, "PlayerID");
        assert_eq!(path[0].to_table, "tbl_Deposits");
    }

    #[test]
    fn test_multi_hop() {
        let path = graph()
            .find_path("tbl_Daily_actions_games", "tbl_Partners")
            .unwrap();
        let tables: Vec<_> = path.iter().map(|s| s.to_table.as_str()).collect();
        assert_eq!(tables, vec!["tbl_Players", "tbl_White_labels", "tbl_Partners"]);
    }

    #[test]
    fn test_join_tree_shares_prefix() {
        let tree = graph()
            .find_join_tree("tbl_Deposits", &["tbl_Players", "tbl_Campaigns", "tbl_Partners"])
            .unwrap();
        let tables: Vec<_> = tree.iter().map(|s| s.to_table.as_str()).collect();
        assert_eq!(
            tables,
            vec!["tbl_Players", "tbl_Campaigns", "tbl_White_labels", "tbl_Partners"]
        );
    }

    #[test]
    fn test_unknown_and_unreachable() {
        let g = graph();
        assert!(matches!(
            g.find_path("tbl_Nope", "tbl_Players"),
            Err(KnowledgeError::UnknownTable(_))
        ));

        let isolated = Catalog::from_toml_str(
            r#"
[[tables]]
name = "a"

[[tables]]
name = "b"
"#,
        )
        .unwrap();
        let g = JoinGraph::from_catalog(&isolated);
        assert!(matches!(g.find_path("a", "b"), Err(KnowledgeError::NoPath { .. })));
        assert!(!g.has_path("a", "b"));
    }
}
