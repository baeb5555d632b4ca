//! This module is responsible for parsing BPMN 2.0 XML files into a BPMN diagram data structure.

use serde::{Deserialize, Deserializer};

use crate::bpmn::{Bpmn, BpmnElement, ElementType, SequenceFlow};

/// We just need the ID and name of each element
/// This macro generates structs with these fields
macro_rules! def_bpmn_struct {
    ($($name:ident),*) => {$(
        #[derive(Debug, Deserialize)]
        struct $name {
            #[serde(rename = "@id")]
            id: String,
            #[serde(rename = "@name", default)]
            name: Option<String>,
        }
    )*};
}

def_bpmn_struct!(
    StartEvent,
    EndEvent,
    IntermediateCatchEvent,
    IntermediateThrowEvent,
    BoundaryEvent,
    Task,
    SendTask,
    ReceiveTask,
    UserTask,
    ServiceTask,
    ManualTask,
    BusinessRuleTask,
    ScriptTask,
    CallActivity,
    SubProcess,
    ExclusiveGateway,
    ParallelGateway,
    InclusiveGateway,
    EventBasedGateway,
    ComplexGateway
);

#[derive(Debug, Deserialize)]
struct SequenceFlowXml {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@sourceRef")]
    source_id: String,
    #[serde(rename = "@targetRef")]
    target_id: String,
}

/// A BPMN process consists of a unique ID and a list of events, tasks, gateways, and sequence flows.
/// Everything else (lanes, data objects, annotations, ...) is ignored.
#[derive(Debug, Deserialize)]
struct Process {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "task", default)]
    tasks: Vec<Task>,
    #[serde(rename = "userTask", default)]
    user_tasks: Vec<UserTask>,
    #[serde(rename = "manualTask", default)]
    manual_tasks: Vec<ManualTask>,
    #[serde(rename = "scriptTask", default)]
    script_tasks: Vec<ScriptTask>,
    #[serde(rename = "serviceTask", default)]
    service_tasks: Vec<ServiceTask>,
    #[serde(rename = "businessRuleTask", default)]
    business_rule_tasks: Vec<BusinessRuleTask>,
    #[serde(rename = "sendTask", default)]
    send_tasks: Vec<SendTask>,
    #[serde(rename = "receiveTask", default)]
    receive_tasks: Vec<ReceiveTask>,
    #[serde(rename = "callActivity", default)]
    call_activities: Vec<CallActivity>,
    #[serde(rename = "subProcess", default)]
    sub_processes: Vec<SubProcess>,
    #[serde(rename = "startEvent", default)]
    start_events: Vec<StartEvent>,
    #[serde(rename = "endEvent", default)]
    end_events: Vec<EndEvent>,
    #[serde(rename = "intermediateCatchEvent", default)]
    intermediate_catch_events: Vec<IntermediateCatchEvent>,
    #[serde(rename = "intermediateThrowEvent", default)]
    intermediate_throw_events: Vec<IntermediateThrowEvent>,
    #[serde(rename = "boundaryEvent", default)]
    boundary_events: Vec<BoundaryEvent>,
    #[serde(rename = "exclusiveGateway", default)]
    exclusive_gateways: Vec<ExclusiveGateway>,
    #[serde(rename = "parallelGateway", default)]
    parallel_gateways: Vec<ParallelGateway>,
    #[serde(rename = "inclusiveGateway", default)]
    inclusive_gateways: Vec<InclusiveGateway>,
    #[serde(rename = "eventBasedGateway", default)]
    event_based_gateways: Vec<EventBasedGateway>,
    #[serde(rename = "complexGateway", default)]
    complex_gateways: Vec<ComplexGateway>,
    #[serde(rename = "sequenceFlow", default)]
    sequence_flows: Vec<SequenceFlowXml>,
}

/// The root element of a BPMN 2.0 XML file.
/// This is the type we deserialize the XML file into, and then convert into a BPMN diagram.
/// Collaboration files carry one process per pool.
#[derive(Debug, Deserialize)]
struct BpmnXml {
    #[serde(rename = "process")]
    processes: Vec<Process>,
}

/// Convert a deserialized BPMN XML file into a BPMN diagram.
/// All processes are merged into one diagram, which keeps the id of the first process.
/// Within each process, elements are grouped by kind (tasks, events, gateways), each group in document order.
impl From<BpmnXml> for Bpmn {
    fn from(file: BpmnXml) -> Self {
        let id = file
            .processes
            .first()
            .map(|process| process.id.clone())
            .unwrap_or_default();
        let mut elements = Vec::new();
        let mut sequence_flows = Vec::new();

        macro_rules! insert {
            ($iter:expr, $element_type:expr) => {
                for element in $iter {
                    elements.push(BpmnElement {
                        id: element.id,
                        name: element
                            .name
                            .map(|name| name.trim().to_string())
                            .filter(|name| !name.is_empty()),
                        element_type: $element_type,
                    });
                }
            };
        }

        for process in file.processes {
            insert!(process.tasks, ElementType::Task);
            insert!(process.user_tasks, ElementType::Task);
            insert!(process.manual_tasks, ElementType::Task);
            insert!(process.script_tasks, ElementType::Task);
            insert!(process.service_tasks, ElementType::Task);
            insert!(process.business_rule_tasks, ElementType::Task);
            insert!(process.send_tasks, ElementType::Task);
            insert!(process.receive_tasks, ElementType::Task);
            insert!(process.call_activities, ElementType::Task);
            insert!(process.sub_processes, ElementType::Task);
            insert!(process.start_events, ElementType::StartEvent);
            insert!(process.end_events, ElementType::EndEvent);
            insert!(process.intermediate_catch_events, ElementType::IntermediateEvent);
            insert!(process.intermediate_throw_events, ElementType::IntermediateEvent);
            insert!(process.exclusive_gateways, ElementType::ExclusiveGateway);
            insert!(process.parallel_gateways, ElementType::ParallelGateway);
            insert!(process.boundary_events, ElementType::Unsupported("boundaryEvent"));
            insert!(process.inclusive_gateways, ElementType::Unsupported("inclusiveGateway"));
            insert!(process.event_based_gateways, ElementType::Unsupported("eventBasedGateway"));
            insert!(process.complex_gateways, ElementType::Unsupported("complexGateway"));

            sequence_flows.extend(process.sequence_flows.into_iter().map(|flow| SequenceFlow {
                id: flow.id,
                source_id: flow.source_id,
                target_id: flow.target_id,
            }));
        }

        Bpmn {
            id,
            elements,
            sequence_flows,
        }
    }
}

/// To deserialize a BPMN diagram, we first deserialize the XML file into a BpmnXml struct
/// and then convert this struct into a Bpmn diagram
impl<'de> Deserialize<'de> for Bpmn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BpmnXml::deserialize(deserializer).map(Into::into)
    }
}
