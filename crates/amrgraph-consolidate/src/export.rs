//! JSON view of the corpus graph for downstream consumers.

use crate::annotated::GlobalGraph;
use crate::candidates::{Meaning, Mention};
use amrgraph_dsl::VertexKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexExport {
    pub id: String,
    pub sentence: Option<String>,
    #[serde(flatten)]
    pub kind: VertexKind,
    pub mentions: Vec<Mention>,
    pub meaning: Option<Meaning>,
    pub weight: Option<f64>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: String,
    pub target: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub vertices: Vec<VertexExport>,
    pub edges: Vec<EdgeExport>,
}

impl GraphExport {
    pub fn from_global(global: &GlobalGraph) -> Self {
        let graph = &global.graph;
        let vertices = global
            .vertices()
            .into_iter()
            .map(|id| {
                let note = global.note(id);
                let chosen = note.and_then(|n| n.chosen.as_ref());
                VertexExport {
                    id: graph.name(id).to_string(),
                    sentence: global.source(id).map(str::to_string),
                    kind: graph.kind(id).cloned().unwrap_or(VertexKind::Variable),
                    mentions: note.map(|n| n.mentions.clone()).unwrap_or_default(),
                    meaning: chosen.map(|c| c.meaning.clone()),
                    weight: chosen.map(|c| c.weight),
                    types: note
                        .map(|n| n.types.iter().cloned().collect())
                        .unwrap_or_default(),
                }
            })
            .collect();
        let edges = graph
            .edges()
            .into_iter()
            .map(|(_, edge)| EdgeExport {
                source: graph.name(edge.source).to_string(),
                target: graph.name(edge.target).to_string(),
                role: edge.role.clone(),
            })
            .collect();
        Self { vertices, edges }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotated::AnnotatedGraph;
    use amrgraph_dsl::{Alignments, SemanticGraph};

    #[test]
    fn export_names_vertices_by_sentence() {
        let mut g = SemanticGraph::new("s1", "w");
        let w = g.vertex("w").unwrap();
        let b = g.add_vertex("b", VertexKind::Variable);
        g.add_edge(w, ":ARG0", b).unwrap();
        let mut sentence = AnnotatedGraph::new(g, Alignments::new());
        sentence.note_mut(w).types.insert("want-01".into());

        let mut global = GlobalGraph::default();
        global.add_sentence(&sentence);
        let export = GraphExport::from_global(&global);

        assert_eq!(export.vertices.len(), 2);
        assert_eq!(export.vertices[0].id, "s1.w");
        assert_eq!(export.vertices[0].types, vec!["want-01"]);
        assert_eq!(
            export.edges,
            vec![EdgeExport {
                source: "s1.w".into(),
                target: "s1.b".into(),
                role: ":ARG0".into(),
            }]
        );

        let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(json["vertices"][0]["kind"], "variable");
        assert_eq!(json["vertices"][1]["sentence"], "s1");
    }
}
