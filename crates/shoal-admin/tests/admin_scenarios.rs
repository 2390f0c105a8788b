//! End-to-end decommission and maintenance scenarios, driving the
//! controller, the event bus, and both drain gates against the in-memory
//! registry.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use shoal_admin::{
    spawn_drain_dispatcher, AdminConfig, AdminController, AdminError, AdminEvent, Datanode,
    DatanodeId, DnsResolver, EventBus, InMemoryNodeRegistry, NodePort, NodeRegistry,
    NodeReplicationReport, NodeStatus, NoopContainerManager, OperationalState, Pipeline,
    PipelineDrainGate, PipelineId, PipelineManager, PipelineReportFromDatanode, PipelineState,
    ReplicationDrainGate, ResolvedHost, Result,
};

struct StaticDns(HashMap<String, IpAddr>);

impl StaticDns {
    fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self(
            entries
                .iter()
                .map(|(h, ip)| (h.to_string(), ip.parse().unwrap()))
                .collect(),
        ))
    }
}

#[async_trait]
impl DnsResolver for StaticDns {
    async fn lookup(&self, hostname: &str) -> std::io::Result<ResolvedHost> {
        match self.0.get(hostname) {
            Some(ip) => Ok(ResolvedHost {
                hostname: hostname.to_string(),
                address: *ip,
            }),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unknown host {}", hostname),
            )),
        }
    }
}

struct RecordingPipelineManager {
    pipelines: Mutex<HashMap<PipelineId, Pipeline>>,
    finalized: Mutex<Vec<(PipelineId, bool)>>,
}

impl RecordingPipelineManager {
    fn with(pipelines: Vec<Pipeline>) -> Arc<Self> {
        Arc::new(Self {
            pipelines: Mutex::new(pipelines.into_iter().map(|p| (p.id, p)).collect()),
            finalized: Mutex::new(Vec::new()),
        })
    }

    async fn finalized(&self) -> Vec<(PipelineId, bool)> {
        self.finalized.lock().await.clone()
    }
}

#[async_trait]
impl PipelineManager for RecordingPipelineManager {
    async fn pipeline(&self, id: PipelineId) -> Result<Pipeline> {
        self.pipelines
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(AdminError::PipelineNotFound(id))
    }

    async fn finalize_and_destroy(
        &self,
        pipeline: &Pipeline,
        closed_by_command: bool,
    ) -> Result<()> {
        if let Some(p) = self.pipelines.lock().await.get_mut(&pipeline.id) {
            p.state = PipelineState::Closed;
        }
        self.finalized
            .lock()
            .await
            .push((pipeline.id, closed_by_command));
        Ok(())
    }
}

fn make_node(hostname: &str, ip: &str, ports: &[u16]) -> Datanode {
    Datanode {
        id: DatanodeId::random(),
        hostname: hostname.to_string(),
        ip: ip.parse().unwrap(),
        ports: ports.iter().map(|p| NodePort::new("storage", *p)).collect(),
    }
}

struct Cluster {
    registry: Arc<InMemoryNodeRegistry>,
    controller: AdminController,
    pipeline_gate: PipelineDrainGate,
    replication_gate: ReplicationDrainGate,
    pipeline_manager: Arc<RecordingPipelineManager>,
}

impl Cluster {
    async fn with(nodes: Vec<Datanode>, pipelines: Vec<Pipeline>) -> Self {
        let registry = Arc::new(InMemoryNodeRegistry::new());
        let mut dns = HashMap::new();
        for dn in &nodes {
            dns.insert(dn.hostname.clone(), dn.ip);
            dns.insert(dn.ip.to_string(), dn.ip);
            registry.register(dn.clone()).await;
        }
        let pipeline_manager = RecordingPipelineManager::with(pipelines);
        let controller = AdminController::new(
            AdminConfig::default(),
            registry.clone(),
            Arc::new(StaticDns(dns)),
            Arc::new(NoopContainerManager),
        );
        let pipeline_gate =
            PipelineDrainGate::new(registry.clone(), pipeline_manager.clone());
        let replication_gate = ReplicationDrainGate::new(registry.clone());
        Self {
            registry,
            controller,
            pipeline_gate,
            replication_gate,
            pipeline_manager,
        }
    }

    async fn state_of(&self, dn: &Datanode) -> OperationalState {
        self.registry
            .node_status(dn.id)
            .await
            .unwrap()
            .operational_state()
    }

    fn replication_report(
        &self,
        dn: &Datanode,
        state: OperationalState,
        containers: u64,
        sufficient: u64,
    ) -> NodeReplicationReport {
        NodeReplicationReport {
            datanode_id: dn.id,
            status: NodeStatus::new(state),
            containers,
            sufficiently_replicated_containers: sufficient,
        }
    }
}

// Scenario: decommission of a single healthy node. Replication finishes
// before the pipelines have closed, so the node waits in `Decommissioning`
// until the registry reflects the closure.
#[tokio::test]
async fn decommission_single_node_waits_for_both_gates() {
    let dn1 = make_node("dn1.example.com", "10.0.0.1", &[9866]);
    let p1 = Pipeline::new(PipelineId::random(), PipelineState::Open);
    let cluster = Cluster::with(vec![dn1.clone()], vec![p1.clone()]).await;
    cluster.registry.add_pipeline(dn1.id, p1.id).await.unwrap();

    cluster
        .controller
        .decommission_nodes(&["10.0.0.1".to_string()])
        .await
        .unwrap();
    assert_eq!(
        cluster.state_of(&dn1).await,
        OperationalState::Decommissioning
    );

    // Decommission does not drive pipeline closure through this gate.
    cluster
        .pipeline_gate
        .on_pipeline_report(&PipelineReportFromDatanode {
            datanode_id: dn1.id,
            pipeline_ids: vec![p1.id],
        })
        .await;
    assert!(cluster.pipeline_manager.finalized().await.is_empty());

    // Fully replicated, but the pipeline set is still non-empty.
    let report =
        cluster.replication_report(&dn1, OperationalState::Decommissioning, 5, 5);
    cluster.replication_gate.on_replication_report(&report).await;
    assert_eq!(
        cluster.state_of(&dn1).await,
        OperationalState::Decommissioning
    );

    // The pipeline machinery closes the pipeline independently; the
    // registry now reports an empty set, and the same report completes the
    // decommission.
    cluster.registry.remove_pipeline(dn1.id, p1.id).await.unwrap();
    cluster.replication_gate.on_replication_report(&report).await;
    assert_eq!(
        cluster.state_of(&dn1).await,
        OperationalState::Decommissioned
    );
}

// Scenario: maintenance entry drives closure of the node's open pipelines,
// leaving already-closed ones alone.
#[tokio::test]
async fn maintenance_entry_closes_open_pipelines_only() {
    let dn2 = make_node("dn2.example.com", "10.0.0.2", &[9866]);
    let p2 = Pipeline::new(PipelineId::random(), PipelineState::Open);
    let p3 = Pipeline::new(PipelineId::random(), PipelineState::Closed);
    let cluster = Cluster::with(vec![dn2.clone()], vec![p2.clone(), p3.clone()]).await;
    cluster
        .registry
        .set_operational_state(dn2.id, OperationalState::EnteringMaintenance)
        .await
        .unwrap();

    cluster
        .pipeline_gate
        .on_pipeline_report(&PipelineReportFromDatanode {
            datanode_id: dn2.id,
            pipeline_ids: vec![p2.id, p3.id],
        })
        .await;

    assert_eq!(
        cluster.pipeline_manager.finalized().await,
        vec![(p2.id, true)]
    );
}

// Scenario: two datanodes share an address; the port picks one.
#[tokio::test]
async fn multihomed_host_disambiguated_by_port() {
    let first = make_node("shared.example.com", "10.0.0.9", &[9866]);
    let second = make_node("shared.example.com", "10.0.0.9", &[9867]);
    let cluster = Cluster::with(vec![first.clone(), second.clone()], vec![]).await;

    cluster
        .controller
        .decommission_nodes(&["shared.example.com:9867".to_string()])
        .await
        .unwrap();

    assert_eq!(cluster.state_of(&first).await, OperationalState::InService);
    assert_eq!(
        cluster.state_of(&second).await,
        OperationalState::Decommissioning
    );
}

// Scenario: the same shared address without a port is ambiguous and fails
// the batch.
#[tokio::test]
async fn multihomed_host_without_port_is_rejected() {
    let first = make_node("shared.example.com", "10.0.0.9", &[9866]);
    let second = make_node("shared.example.com", "10.0.0.9", &[9867]);
    let cluster = Cluster::with(vec![first.clone(), second.clone()], vec![]).await;

    let result = cluster
        .controller
        .decommission_nodes(&["shared.example.com".to_string()])
        .await;

    match result {
        Err(AdminError::InvalidHostString { reason, .. }) => {
            assert!(reason.contains("no datanode port matched"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(cluster.state_of(&first).await, OperationalState::InService);
    assert_eq!(cluster.state_of(&second).await, OperationalState::InService);
}

// Scenario: decommission of a node entering maintenance is illegal; the
// single-node call reports it, the batch call logs and continues.
#[tokio::test]
async fn illegal_transition_propagates_from_single_node_call_only() {
    let dn = make_node("dn1.example.com", "10.0.0.1", &[9866]);
    let cluster = Cluster::with(vec![dn.clone()], vec![]).await;
    cluster
        .registry
        .set_operational_state(dn.id, OperationalState::EnteringMaintenance)
        .await
        .unwrap();

    let single = cluster.controller.start_decommission(&dn).await;
    assert!(matches!(single, Err(AdminError::InvalidNodeState { .. })));

    let batch = cluster
        .controller
        .decommission_nodes(&["dn1.example.com".to_string()])
        .await;
    assert!(batch.is_ok());
    assert_eq!(
        cluster.state_of(&dn).await,
        OperationalState::EnteringMaintenance
    );
}

// Scenario: recommission while the drain is still running; the drain
// report that arrives afterwards must not move the node.
#[tokio::test]
async fn recommission_during_drain_cancels_the_drain() {
    let dn = make_node("dn1.example.com", "10.0.0.1", &[9866]);
    let cluster = Cluster::with(vec![dn.clone()], vec![]).await;

    cluster
        .controller
        .decommission_nodes(&["dn1.example.com".to_string()])
        .await
        .unwrap();
    assert_eq!(
        cluster.state_of(&dn).await,
        OperationalState::Decommissioning
    );

    cluster
        .controller
        .recommission_nodes(&["dn1.example.com".to_string()])
        .await
        .unwrap();
    assert_eq!(cluster.state_of(&dn).await, OperationalState::InService);

    // A drain report generated before the recommission arrives late.
    let stale = cluster.replication_report(&dn, OperationalState::Decommissioning, 5, 5);
    cluster.replication_gate.on_replication_report(&stale).await;
    assert_eq!(cluster.state_of(&dn).await, OperationalState::InService);
}

// A report delivered before any command takes effect is ignored by the
// gates' state predicates.
#[tokio::test]
async fn report_before_command_is_ignored() {
    let dn = make_node("dn1.example.com", "10.0.0.1", &[9866]);
    let cluster = Cluster::with(vec![dn.clone()], vec![]).await;

    let early = cluster.replication_report(&dn, OperationalState::InService, 5, 5);
    cluster.replication_gate.on_replication_report(&early).await;
    assert_eq!(cluster.state_of(&dn).await, OperationalState::InService);

    cluster
        .controller
        .decommission_nodes(&["dn1.example.com".to_string()])
        .await
        .unwrap();
    let report = cluster.replication_report(&dn, OperationalState::Decommissioning, 5, 5);
    cluster.replication_gate.on_replication_report(&report).await;
    assert_eq!(
        cluster.state_of(&dn).await,
        OperationalState::Decommissioned
    );
}

// Repeating a batch command leaves the cluster in the same state.
#[tokio::test]
async fn repeated_decommission_batches_are_idempotent() {
    let dn1 = make_node("dn1.example.com", "10.0.0.1", &[9866]);
    let dn2 = make_node("dn2.example.com", "10.0.0.2", &[9866]);
    let cluster = Cluster::with(vec![dn1.clone(), dn2.clone()], vec![]).await;
    let hosts = [
        "dn1.example.com".to_string(),
        "dn2.example.com".to_string(),
    ];

    cluster.controller.decommission_nodes(&hosts).await.unwrap();
    cluster.controller.decommission_nodes(&hosts).await.unwrap();

    assert_eq!(
        cluster.state_of(&dn1).await,
        OperationalState::Decommissioning
    );
    assert_eq!(
        cluster.state_of(&dn2).await,
        OperationalState::Decommissioning
    );
}

// Full wiring: reports published on the event bus reach the gates through
// the dispatcher and complete a maintenance entry end to end.
#[tokio::test]
async fn event_bus_drives_maintenance_to_completion() {
    let dn = make_node("dn1.example.com", "10.0.0.1", &[9866]);
    let p1 = Pipeline::new(PipelineId::random(), PipelineState::Open);
    let cluster = Cluster::with(vec![dn.clone()], vec![p1.clone()]).await;
    cluster.registry.add_pipeline(dn.id, p1.id).await.unwrap();

    let bus = EventBus::new(64);
    let dispatcher = spawn_drain_dispatcher(
        &bus,
        Arc::new(PipelineDrainGate::new(
            cluster.registry.clone(),
            cluster.pipeline_manager.clone(),
        )),
        Arc::new(ReplicationDrainGate::new(cluster.registry.clone())),
    );

    cluster
        .controller
        .start_maintenance_nodes(&["dn1.example.com".to_string()], 4)
        .await
        .unwrap();

    bus.publish(AdminEvent::PipelineReport(PipelineReportFromDatanode {
        datanode_id: dn.id,
        pipeline_ids: vec![p1.id],
    }));

    // Wait for the dispatcher to ask for the close.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while cluster.pipeline_manager.finalized().await.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "pipeline never closed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        cluster.pipeline_manager.finalized().await,
        vec![(p1.id, true)]
    );

    // Closure completes: the registry drops the pipeline, and the next
    // replication report finishes the maintenance entry.
    cluster.registry.remove_pipeline(dn.id, p1.id).await.unwrap();
    bus.publish(AdminEvent::ReplicationReport(cluster.replication_report(
        &dn,
        OperationalState::EnteringMaintenance,
        2,
        2,
    )));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if cluster.state_of(&dn).await == OperationalState::InMaintenance {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "node never reached maintenance"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    drop(bus);
    let _ = dispatcher.await;
}
