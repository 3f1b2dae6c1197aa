use crate::tests::support::{cluster_in, init_tracing, ssd};
use crate::{
    BootDiskSpec, Cluster, ControlPlane, ControlPlaneError, ControlPlaneStore, DiskType, Folder,
    HypervisorCapability, HypervisorFactory, InMemoryStore, InstanceCreateConfig,
    InstanceStatus, InstanceSyncAction, Node, NodeSyncOutcome, Organization, Project, RemoteId,
    VendorHypervisorFactory, Zone,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

const TOKEN_HEADER: &str = "PVEAPIToken=sync@pve!control-plane=0b4c1d2e-secret";

fn cluster_at(mock_server: &MockServer) -> Cluster {
    let mut cluster = cluster_in(
        &Organization {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
        },
        &Zone {
            id: Uuid::new_v4(),
            name: "par1".to_string(),
        },
        "pve-par1",
    );
    cluster.credentials.host = mock_server.uri();
    cluster
}

fn adapter(cluster: &Cluster) -> Arc<dyn HypervisorCapability> {
    init_tracing();
    VendorHypervisorFactory::default()
        .for_cluster(cluster)
        .unwrap()
}

#[tokio::test]
async fn test_list_nodes() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes"))
        .and(header("authorization", TOKEN_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "node": "pve1", "status": "online", "cpu": 0.04, "maxcpu": 16 },
                { "node": "pve2", "status": "offline" }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let nodes = adapter(&cluster).list_nodes().await.unwrap();
    let names: Vec<&str> = nodes.iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, ["pve1", "pve2"]);
    assert!(nodes.iter().all(|node| node.cluster_id == cluster.id));
}

#[tokio::test]
async fn test_list_instances_normalizes_listing() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);
    let node = Node::new(cluster.id, "pve1");

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "vmid": 100, "name": "web-1", "status": "running", "maxmem": 2147483648_i64 },
                { "vmid": "101", "status": "STOPPED" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let instances = adapter(&cluster).list_instances(&node).await.unwrap();
    assert_eq!(instances.len(), 2);

    assert_eq!(instances[0].pve_vm_id, RemoteId::from_vmid(100));
    assert_eq!(instances[0].name, "web-1");
    assert_eq!(instances[0].status, InstanceStatus::Running);
    assert_eq!(instances[0].node_id, node.id);

    assert_eq!(instances[1].name, "VM 101");
    assert_eq!(instances[1].status, InstanceStatus::Stopped);
}

#[tokio::test]
async fn test_unknown_vm_status_is_rejected() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "vmid": 100, "name": "web-1", "status": "paused" }]
        })))
        .mount(&mock_server)
        .await;

    let result = adapter(&cluster)
        .list_instances(&Node::new(cluster.id, "pve1"))
        .await;
    match result {
        Err(ControlPlaneError::UnrecognizedRemoteState { raw, .. }) => assert_eq!(raw, "paused"),
        other => panic!("expected UnrecognizedRemoteState, got {:?}", other),
    }
}

#[tokio::test]
async fn test_next_instance_id() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/cluster/nextid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "104" })))
        .mount(&mock_server)
        .await;

    let id = adapter(&cluster).next_instance_id().await.unwrap();
    assert_eq!(id, RemoteId::from_vmid(104));
}

#[tokio::test]
async fn test_create_instance_sends_vm_definition() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(body_json(json!({
            "vmid": 104,
            "name": "web-1",
            "cores": 2,
            "memory": 2048,
            "ostype": "l26",
            "scsihw": "virtio-scsi-single",
            "scsi0": "local-lvm:40,ssd=1",
            "boot": "order=scsi0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": "UPID:pve1:000A1B2C:0F00BA12:65A1B2C3:qmcreate:104:sync@pve!control-plane:"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = InstanceCreateConfig {
        name: "web-1".to_string(),
        cores: 2,
        memory_mb: 2048,
        disk: ssd(40),
    };
    adapter(&cluster)
        .create_instance(
            &Node::new(cluster.id, "pve1"),
            RemoteId::from_vmid(104),
            &config,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_instance_reports_taken_id() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("unable to create VM 104 - VM 104 already exists on node 'pve2'"),
        )
        .mount(&mock_server)
        .await;

    let config = InstanceCreateConfig {
        name: "web-1".to_string(),
        cores: 1,
        memory_mb: 1024,
        disk: BootDiskSpec {
            os: "l26".to_string(),
            size_gb: 32,
            disk_type: DiskType::Hdd,
        },
    };
    let result = adapter(&cluster)
        .create_instance(
            &Node::new(cluster.id, "pve1"),
            RemoteId::from_vmid(104),
            &config,
        )
        .await;

    match result {
        Err(ControlPlaneError::RemoteIdConflict { remote_id }) => assert_eq!(remote_id, "104"),
        other => panic!("expected RemoteIdConflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_power_and_delete_calls() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);
    let node = Node::new(cluster.id, "pve1");
    let upid = json!({ "data": "UPID:pve1:00000001:00000001:00000001:task:110:root@pam:" });

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/110/status/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upid.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/110/status/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upid.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api2/json/nodes/pve1/qemu/110"))
        .and(query_param("purge", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upid))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = adapter(&cluster);
    let id = RemoteId::from_vmid(110);
    api.start_instance(&node, id).await.unwrap();
    api.stop_instance(&node, id).await.unwrap();
    api.delete_instance(&node, id).await.unwrap();
}

#[tokio::test]
async fn test_instance_status() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/110/status/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "status": "running", "qmpstatus": "running", "uptime": 3600, "vmid": 110 }
        })))
        .mount(&mock_server)
        .await;

    let status = adapter(&cluster)
        .instance_status(&Node::new(cluster.id, "pve1"), RemoteId::from_vmid(110))
        .await
        .unwrap();
    assert_eq!(status, InstanceStatus::Running);
}

#[tokio::test]
async fn test_instance_config_reads_boot_disk() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/110/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "boot": "order=ide2;scsi0;net0",
                "ide2": "local:iso/debian-12.iso,media=cdrom,size=628M",
                "scsi0": "local-lvm:vm-110-disk-0,iothread=1,size=64G,ssd=1",
                "net0": "virtio=BC:24:11:2A:3B:4C,bridge=vmbr0",
                "ostype": "l26",
                "cores": 2,
                "memory": "4096"
            }
        })))
        .mount(&mock_server)
        .await;

    let config = adapter(&cluster)
        .instance_config(&Node::new(cluster.id, "pve1"), RemoteId::from_vmid(110))
        .await
        .unwrap();
    assert_eq!(config.disk, ssd(64));
}

#[tokio::test]
async fn test_instance_config_of_resized_disk_without_ostype() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/105/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "boot": "c",
                "bootdisk": "scsi0",
                "scsi0": "local-lvm:vm-105-disk-0,size=10752M",
                "cores": 1
            }
        })))
        .mount(&mock_server)
        .await;

    let config = adapter(&cluster)
        .instance_config(&Node::new(cluster.id, "pve1"), RemoteId::from_vmid(105))
        .await
        .unwrap();
    assert_eq!(
        config.disk,
        BootDiskSpec {
            os: "other".to_string(),
            size_gb: 11,
            disk_type: DiskType::Hdd,
        }
    );
}

#[tokio::test]
async fn test_instance_config_without_boot_disk() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/111/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "boot": "order=net0", "net0": "virtio=BC:24:11:00:00:01", "ostype": "l26" }
        })))
        .mount(&mock_server)
        .await;

    let result = adapter(&cluster)
        .instance_config(&Node::new(cluster.id, "pve1"), RemoteId::from_vmid(111))
        .await;
    assert!(matches!(
        result,
        Err(ControlPlaneError::UnrecognizedRemoteState { .. })
    ));
}

#[tokio::test]
async fn test_rejected_token_is_not_retried() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token value!"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = adapter(&cluster).list_nodes().await;
    match result {
        Err(error @ ControlPlaneError::RemoteUnavailable(_)) => {
            assert!(error.to_string().contains("authentication rejected"))
        }
        other => panic!("expected RemoteUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_synchronize_cluster_against_proxmox_api() {
    let mock_server = MockServer::start().await;
    let cluster = cluster_at(&mock_server);

    let store = Arc::new(InMemoryStore::new());
    let folder = Folder {
        id: Uuid::new_v4(),
        organization_id: cluster.organization_id,
        name: "Interne".to_string(),
    };
    let project = Project {
        id: Uuid::new_v4(),
        folder_id: folder.id,
        name: "Interne".to_string(),
    };
    store.insert_folder(folder).await;
    store.insert_project(project.clone()).await;
    store.insert_cluster(cluster.clone()).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "node": "pve1", "status": "online" }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "vmid": 100, "name": "web-1", "status": "running" }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "bootdisk": "scsi0",
                "scsi0": "local-lvm:vm-100-disk-0,size=1T",
                "ostype": "win11"
            }
        })))
        .mount(&mock_server)
        .await;

    let control_plane = ControlPlane::builder().store(store.clone()).build().unwrap();
    let report = control_plane
        .synchronization()
        .synchronize_cluster(&cluster)
        .await
        .unwrap();

    assert!(report.is_complete());
    let node_report = report.node("pve1").unwrap();
    match &node_report.outcome {
        NodeSyncOutcome::Synchronized { instances } => {
            assert_eq!(instances.len(), 1);
            assert!(matches!(
                instances[0].outcome,
                Ok(InstanceSyncAction::Discovered)
            ));
        }
        NodeSyncOutcome::Failed(error) => panic!("node failed: {}", error),
    }

    let rows = store
        .list_instances_by_node(node_report.node_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, InstanceStatus::Running);
    assert_eq!(rows[0].project_id, project.id);

    let disk = store
        .find_boot_disk(rows[0].boot_disk_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(disk.size_gb, 1024);
    assert_eq!(disk.disk_type, DiskType::Hdd);
    assert_eq!(disk.os, "win11");
}
