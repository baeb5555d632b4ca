//! This module serializes a rendered flow graph into a BPMN 2.0 document,
//! including the diagram section with shape bounds and edge waypoints.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::flow_graph::{EventRole, GatewayKind, NodeKind};
use crate::render::Rendering;

const BPMN_MODEL_NAMESPACE: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
const BPMN_DI_NAMESPACE: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
const DC_NAMESPACE: &str = "http://www.omg.org/spec/DD/20100524/DC";
const DI_NAMESPACE: &str = "http://www.omg.org/spec/DD/20100524/DI";

#[derive(Debug, Serialize)]
struct FlowNode {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "bpmn2:incoming")]
    incoming: Vec<String>,
    #[serde(rename = "bpmn2:outgoing")]
    outgoing: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SequenceFlow {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@sourceRef")]
    source: String,
    #[serde(rename = "@targetRef")]
    target: String,
}

#[derive(Debug, Serialize)]
enum FlowElement {
    #[serde(rename = "bpmn2:task")]
    Task(FlowNode),
    #[serde(rename = "bpmn2:startEvent")]
    StartEvent(FlowNode),
    #[serde(rename = "bpmn2:endEvent")]
    EndEvent(FlowNode),
    #[serde(rename = "bpmn2:intermediateCatchEvent")]
    IntermediateEvent(FlowNode),
    #[serde(rename = "bpmn2:exclusiveGateway")]
    ExclusiveGateway(FlowNode),
    #[serde(rename = "bpmn2:parallelGateway")]
    ParallelGateway(FlowNode),
    #[serde(rename = "bpmn2:sequenceFlow")]
    SequenceFlow(SequenceFlow),
}

#[derive(Debug, Serialize)]
struct Process {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@isExecutable")]
    is_executable: bool,
    #[serde(rename = "$value")]
    elements: Vec<FlowElement>,
}

#[derive(Debug, Serialize)]
struct Bounds {
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
    #[serde(rename = "@width")]
    width: f64,
    #[serde(rename = "@height")]
    height: f64,
}

impl From<crate::render::Bounds> for Bounds {
    fn from(bounds: crate::render::Bounds) -> Self {
        Bounds {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        }
    }
}

#[derive(Debug, Serialize)]
struct Shape {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@bpmnElement")]
    element: String,
    #[serde(rename = "@isMarkerVisible", skip_serializing_if = "Option::is_none")]
    marker_visible: Option<bool>,
    #[serde(rename = "dc:Bounds")]
    bounds: Bounds,
}

#[derive(Debug, Serialize)]
struct Waypoint {
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
}

#[derive(Debug, Serialize)]
struct Edge {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@bpmnElement")]
    element: String,
    #[serde(rename = "di:waypoint")]
    waypoints: Vec<Waypoint>,
}

#[derive(Debug, Serialize)]
enum PlaneElement {
    #[serde(rename = "bpmndi:BPMNShape")]
    Shape(Shape),
    #[serde(rename = "bpmndi:BPMNEdge")]
    Edge(Edge),
}

#[derive(Debug, Serialize)]
struct Plane {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@bpmnElement")]
    element: String,
    #[serde(rename = "$value")]
    elements: Vec<PlaneElement>,
}

#[derive(Debug, Serialize)]
struct Diagram {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "bpmndi:BPMNPlane")]
    plane: Plane,
}

/// Internal representation of a BPMN 2.0 document with diagram information.
/// This is the format a rendered flow graph is serialized to.
#[derive(Debug, Serialize)]
pub struct Definitions {
    #[serde(rename = "@xmlns:bpmn2")]
    xmlns_bpmn2: &'static str,
    #[serde(rename = "@xmlns:bpmndi")]
    xmlns_bpmndi: &'static str,
    #[serde(rename = "@xmlns:dc")]
    xmlns_dc: &'static str,
    #[serde(rename = "@xmlns:di")]
    xmlns_di: &'static str,
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@targetNamespace")]
    target_namespace: &'static str,
    #[serde(rename = "bpmn2:process")]
    process: Process,
    #[serde(rename = "bpmndi:BPMNDiagram")]
    diagram: Diagram,
}

/// Display a BPMN document as XML
impl Display for Definitions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        let mut ser = quick_xml::se::Serializer::with_root(f, Some("bpmn2:definitions"))
            .map_err(|_| std::fmt::Error)?;
        ser.indent(' ', 2);
        self.serialize(ser).map_err(|_| std::fmt::Error)
    }
}

/// Convert a rendered flow graph into a BPMN document
impl From<&Rendering> for Definitions {
    fn from(rendering: &Rendering) -> Self {
        let graph = &rendering.graph;
        let layout = &rendering.layout;

        // Each node lists the flows entering and leaving it
        let mut incoming = vec![Vec::new(); graph.len()];
        let mut outgoing = vec![Vec::new(); graph.len()];
        for edge in graph.edges() {
            outgoing[edge.source.index()].push(edge.id.clone());
            incoming[edge.target.index()].push(edge.id.clone());
        }

        let mut elements = Vec::with_capacity(graph.len() + graph.edges().len());
        let mut plane = Vec::with_capacity(graph.len() + layout.connectors.len());
        for ((node_id, node), (incoming, outgoing)) in graph.nodes().zip(incoming.into_iter().zip(outgoing)) {
            let flow_node = FlowNode {
                id: node.id.clone(),
                name: node.name.clone(),
                incoming,
                outgoing,
            };
            elements.push(match node.kind {
                NodeKind::Task => FlowElement::Task(flow_node),
                NodeKind::Event(EventRole::Start) => FlowElement::StartEvent(flow_node),
                NodeKind::Event(EventRole::End) => FlowElement::EndEvent(flow_node),
                NodeKind::Event(EventRole::Intermediate) => FlowElement::IntermediateEvent(flow_node),
                NodeKind::Gateway(GatewayKind::Exclusive) => FlowElement::ExclusiveGateway(flow_node),
                NodeKind::Gateway(GatewayKind::Parallel) => FlowElement::ParallelGateway(flow_node),
            });
            if let Some(bounds) = layout.bounds(node_id) {
                let marker_visible = matches!(node.kind, NodeKind::Gateway(_)).then_some(true);
                plane.push(PlaneElement::Shape(Shape {
                    id: format!("{}_di", node.id),
                    element: node.id.clone(),
                    marker_visible,
                    bounds: (*bounds).into(),
                }));
            }
        }

        for edge in graph.edges() {
            elements.push(FlowElement::SequenceFlow(SequenceFlow {
                id: edge.id.clone(),
                source: graph.node(edge.source).id.clone(),
                target: graph.node(edge.target).id.clone(),
            }));
        }
        for connector in &layout.connectors {
            let flow = &graph.edges()[connector.edge].id;
            plane.push(PlaneElement::Edge(Edge {
                id: format!("{}_di", flow),
                element: flow.clone(),
                waypoints: connector
                    .waypoints
                    .iter()
                    .map(|point| Waypoint { x: point.x, y: point.y })
                    .collect(),
            }));
        }

        let process_id = graph.id().to_string();
        Definitions {
            xmlns_bpmn2: BPMN_MODEL_NAMESPACE,
            xmlns_bpmndi: BPMN_DI_NAMESPACE,
            xmlns_dc: DC_NAMESPACE,
            xmlns_di: DI_NAMESPACE,
            id: "Definitions_1".to_string(),
            target_namespace: "http://example.bpmn",
            process: Process {
                id: process_id.clone(),
                is_executable: false,
                elements,
            },
            diagram: Diagram {
                id: "BPMNDiagram_1".to_string(),
                plane: Plane {
                    id: "BPMNPlane_1".to_string(),
                    element: process_id,
                    elements: plane,
                },
            },
        }
    }
}
