//! Node identifiers, routing and the compiled graph.
//!
//! ```text
//! GenerateQuery ─► WebResearch ─► Summarize ─► Reflect ──route_research──┐
//!                      ▲                                                 │
//!                      └──────────── loop count <= 1 ◄──────────────────┤
//!                                                                        ▼
//!                               End ◄─ ShortForm|LongForm|Both ◄─ HumanApproval ◄─ Finalize
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::{ApprovalDecision, ResearchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    GenerateQuery,
    WebResearch,
    Summarize,
    Reflect,
    Finalize,
    HumanApproval,
    ShortForm,
    LongForm,
    Both,
    End,
}

impl NodeId {
    pub const ALL: [NodeId; 10] = [
        Self::GenerateQuery,
        Self::WebResearch,
        Self::Summarize,
        Self::Reflect,
        Self::Finalize,
        Self::HumanApproval,
        Self::ShortForm,
        Self::LongForm,
        Self::Both,
        Self::End,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateQuery => "generate_query",
            Self::WebResearch => "web_research",
            Self::Summarize => "summarize",
            Self::Reflect => "reflect",
            Self::Finalize => "finalize",
            Self::HumanApproval => "human_approval",
            Self::ShortForm => "short_form",
            Self::LongForm => "long_form",
            Self::Both => "both",
            Self::End => "end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where the research loop goes after reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    WebResearch,
    Finalize,
}

impl From<NextStep> for NodeId {
    fn from(step: NextStep) -> Self {
        match step {
            NextStep::WebResearch => NodeId::WebResearch,
            NextStep::Finalize => NodeId::Finalize,
        }
    }
}

/// Exactly two search rounds: one more while `research_loop_count <= 1`.
pub fn route_research(state: &ResearchState) -> NextStep {
    if state.research_loop_count <= 1 {
        NextStep::WebResearch
    } else {
        NextStep::Finalize
    }
}

/// Branch chosen by the resumed approval decision.
pub fn route_approval(state: &ResearchState) -> Result<NodeId, PipelineError> {
    match state.pending_decision {
        Some(ApprovalDecision::ShortForm) => Ok(NodeId::ShortForm),
        Some(ApprovalDecision::LongForm) => Ok(NodeId::LongForm),
        Some(ApprovalDecision::Both) => Ok(NodeId::Both),
        None => Err(PipelineError::SuspensionProtocol(
            "approval branch reached without a decision".to_string(),
        )),
    }
}

#[derive(Clone, Copy)]
pub enum Edge {
    Always(NodeId),
    Router(fn(&ResearchState) -> NextStep),
    /// Leaves the suspension point; target picked from `pending_decision`.
    Approval,
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always(to) => write!(f, "Always({})", to),
            Self::Router(_) => f.write_str("Router"),
            Self::Approval => f.write_str("Approval"),
        }
    }
}

/// The fixed research graph. Construct with [`WorkflowGraph::build`].
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    entry: NodeId,
    edges: BTreeMap<NodeId, Edge>,
}

#[derive(Debug, Default)]
struct GraphBuilder {
    entry: Option<NodeId>,
    edges: BTreeMap<NodeId, Edge>,
}

impl GraphBuilder {
    fn entry(mut self, node: NodeId) -> Self {
        self.entry = Some(node);
        self
    }

    fn edge(mut self, from: NodeId, edge: Edge) -> Result<Self, PipelineError> {
        if from == NodeId::End {
            return Err(PipelineError::Config("End has no outgoing edges".to_string()));
        }
        if self.edges.insert(from, edge).is_some() {
            return Err(PipelineError::Config(format!("duplicate edge from '{}'", from)));
        }
        Ok(self)
    }

    fn compile(self) -> Result<WorkflowGraph, PipelineError> {
        let entry = self
            .entry
            .ok_or_else(|| PipelineError::Config("graph has no entry node".to_string()))?;
        for node in NodeId::ALL {
            if node != NodeId::End && !self.edges.contains_key(&node) {
                return Err(PipelineError::Config(format!("node '{}' has no outgoing edge", node)));
            }
        }
        Ok(WorkflowGraph {
            entry,
            edges: self.edges,
        })
    }
}

impl WorkflowGraph {
    /// Register every node and edge. No I/O.
    pub fn build() -> Result<Self, PipelineError> {
        GraphBuilder::default()
            .entry(NodeId::GenerateQuery)
            .edge(NodeId::GenerateQuery, Edge::Always(NodeId::WebResearch))?
            .edge(NodeId::WebResearch, Edge::Always(NodeId::Summarize))?
            .edge(NodeId::Summarize, Edge::Always(NodeId::Reflect))?
            .edge(NodeId::Reflect, Edge::Router(route_research))?
            .edge(NodeId::Finalize, Edge::Always(NodeId::HumanApproval))?
            .edge(NodeId::HumanApproval, Edge::Approval)?
            .edge(NodeId::ShortForm, Edge::Always(NodeId::End))?
            .edge(NodeId::LongForm, Edge::Always(NodeId::End))?
            .edge(NodeId::Both, Edge::Always(NodeId::End))?
            .compile()
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn edge(&self, from: NodeId) -> Option<Edge> {
        self.edges.get(&from).copied()
    }

    /// Node that follows `from` given the freshly merged state.
    pub fn next(&self, from: NodeId, state: &ResearchState) -> Result<NodeId, PipelineError> {
        match self.edge(from) {
            Some(Edge::Always(to)) => Ok(to),
            Some(Edge::Router(route)) => Ok(route(state).into()),
            Some(Edge::Approval) => route_approval(state),
            None => Ok(NodeId::End),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_rounds(n: u32) -> ResearchState {
        ResearchState {
            research_loop_count: n,
            ..ResearchState::new("t")
        }
    }

    #[test]
    fn test_node_names_round_trip() {
        for node in NodeId::ALL {
            assert_eq!(NodeId::parse(node.as_str()), Some(node));
            assert_eq!(
                serde_json::to_value(node).unwrap(),
                serde_json::Value::String(node.as_str().to_string())
            );
        }
        assert_eq!(NodeId::parse("x_agent"), None);
    }

    #[test]
    fn test_router_runs_exactly_two_rounds() {
        assert_eq!(route_research(&state_with_rounds(0)), NextStep::WebResearch);
        assert_eq!(route_research(&state_with_rounds(1)), NextStep::WebResearch);
        assert_eq!(route_research(&state_with_rounds(2)), NextStep::Finalize);
        assert_eq!(route_research(&state_with_rounds(7)), NextStep::Finalize);
    }

    #[test]
    fn test_static_edges() {
        let graph = WorkflowGraph::build().unwrap();
        let state = ResearchState::new("t");
        assert_eq!(graph.entry(), NodeId::GenerateQuery);
        assert_eq!(graph.next(NodeId::GenerateQuery, &state).unwrap(), NodeId::WebResearch);
        assert_eq!(graph.next(NodeId::Finalize, &state).unwrap(), NodeId::HumanApproval);
        assert_eq!(graph.next(NodeId::Both, &state).unwrap(), NodeId::End);
        assert_eq!(graph.next(NodeId::End, &state).unwrap(), NodeId::End);
    }

    #[test]
    fn test_approval_branch() {
        let graph = WorkflowGraph::build().unwrap();
        let mut state = ResearchState::new("t");
        assert!(matches!(
            graph.next(NodeId::HumanApproval, &state),
            Err(PipelineError::SuspensionProtocol(_))
        ));
        for (decision, node) in [
            (ApprovalDecision::ShortForm, NodeId::ShortForm),
            (ApprovalDecision::LongForm, NodeId::LongForm),
            (ApprovalDecision::Both, NodeId::Both),
        ] {
            state.pending_decision = Some(decision);
            assert_eq!(graph.next(NodeId::HumanApproval, &state).unwrap(), node);
        }
    }

    #[test]
    fn test_builder_rejects_incomplete_graph() {
        let err = GraphBuilder::default()
            .entry(NodeId::GenerateQuery)
            .edge(NodeId::GenerateQuery, Edge::Always(NodeId::End))
            .unwrap()
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("web_research"));

        assert!(GraphBuilder::default()
            .edge(NodeId::Reflect, Edge::Router(route_research))
            .unwrap()
            .edge(NodeId::Reflect, Edge::Always(NodeId::End))
            .is_err());
    }
}
