use crate::error::ConfigError;
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Source,
    Stage,
    Sink,
}

/// Directed graph of node names: one source, stages hanging off the source
/// or other stages, and sinks at the leaves.
///
/// Every mutating method validates first and only then touches the graph,
/// so a rejected registration leaves the topology exactly as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    source: Option<String>,
    stages: IndexSet<String>,
    sinks: IndexSet<String>,
    edges: IndexMap<String, Vec<String>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, name: &str) -> Result<(), ConfigError> {
        require_name(name)?;
        if let Some(existing) = &self.source {
            return Err(ConfigError::DuplicateSource {
                existing: existing.clone(),
                name: name.to_string(),
            });
        }
        if self.kind_of(name).is_some() {
            return Err(ConfigError::NameInUse(name.to_string()));
        }
        self.source = Some(name.to_string());
        Ok(())
    }

    pub fn add_stage(&mut self, parent: &str, name: &str) -> Result<(), ConfigError> {
        require_name(parent)?;
        require_name(name)?;
        match self.kind_of(parent) {
            Some(NodeKind::Source) | Some(NodeKind::Stage) => {}
            _ => {
                return Err(ConfigError::UnknownParent {
                    parent: parent.to_string(),
                    name: name.to_string(),
                    expected: "source or stage",
                });
            }
        }
        if self.kind_of(name).is_some() {
            return Err(ConfigError::NameInUse(name.to_string()));
        }

        self.stages.insert(name.to_string());
        self.push_edge(parent, name);
        Ok(())
    }

    /// Adds `parent --> name` for a sink. Returns `true` when `name` is a new
    /// sink and `false` when the edge fans in to an existing one.
    pub fn add_sink(&mut self, parent: &str, name: &str) -> Result<bool, ConfigError> {
        require_name(parent)?;
        require_name(name)?;
        self.require_stage_parent(parent, name)?;
        let is_new = match self.kind_of(name) {
            None => true,
            Some(NodeKind::Sink) => false,
            Some(_) => return Err(ConfigError::NameInUse(name.to_string())),
        };
        self.require_new_edge(parent, name)?;

        if is_new {
            self.sinks.insert(name.to_string());
        }
        self.push_edge(parent, name);
        Ok(is_new)
    }

    /// Adds a fan-in edge from a stage to an already registered sink.
    pub fn add_sink_edge(&mut self, parent: &str, sink: &str) -> Result<(), ConfigError> {
        require_name(parent)?;
        require_name(sink)?;
        self.require_stage_parent(parent, sink)?;
        if !self.sinks.contains(sink) {
            return Err(ConfigError::UnknownSink(sink.to_string()));
        }
        self.require_new_edge(parent, sink)?;

        self.push_edge(parent, sink);
        Ok(())
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(String::as_str)
    }

    pub fn sinks(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(String::as_str)
    }

    pub fn kind_of(&self, name: &str) -> Option<NodeKind> {
        if self.source.as_deref() == Some(name) {
            Some(NodeKind::Source)
        } else if self.stages.contains(name) {
            Some(NodeKind::Stage)
        } else if self.sinks.contains(name) {
            Some(NodeKind::Sink)
        } else {
            None
        }
    }

    /// Children of `name` in registration order.
    pub fn children(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stages fed directly by the source.
    pub fn root_stages(&self) -> &[String] {
        match &self.source {
            Some(source) => self.children(source),
            None => &[],
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// One `parent --> child` line per edge.
    pub fn describe(&self) -> Vec<String> {
        self.edges
            .iter()
            .flat_map(|(parent, children)| {
                children
                    .iter()
                    .map(move |child| format!("{parent} --> {child}"))
            })
            .collect()
    }

    fn require_stage_parent(&self, parent: &str, name: &str) -> Result<(), ConfigError> {
        if self.stages.contains(parent) {
            Ok(())
        } else {
            Err(ConfigError::UnknownParent {
                parent: parent.to_string(),
                name: name.to_string(),
                expected: "stage",
            })
        }
    }

    fn require_new_edge(&self, parent: &str, child: &str) -> Result<(), ConfigError> {
        if self.children(parent).iter().any(|c| c == child) {
            Err(ConfigError::DuplicateEdge {
                parent: parent.to_string(),
                child: child.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn push_edge(&mut self, parent: &str, child: &str) {
        self.edges
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
    }
}

fn require_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        Err(ConfigError::EmptyName)
    } else {
        Ok(())
    }
}
