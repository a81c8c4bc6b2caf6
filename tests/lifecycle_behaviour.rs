//! End-to-end lifecycle scenarios for `CloudServer`.

#[path = "common/http_stub.rs"]
mod http_stub;

use std::time::Duration;

use csi_clouddk::shell::ShellError;
use csi_clouddk::test_support::{
    StubConnector, StubControlPlane, deploy_keys, reachable_server, ssh_address, success_output,
};
use csi_clouddk::{ApiSettings, CloudApi, CloudServer, Credentials, ServerError};
use http_stub::HttpStub;
use rand::SeedableRng;
use rand::rngs::StdRng;

const CREATED_JSON: &str = r#"{
    "identifier": "srv-42",
    "hostname": "csi-node-a",
    "label": "csi-node-a",
    "booted": false,
    "networkInterfaces": [{"ipAddresses": [{"address": "192.0.2.10"}]}]
}"#;

#[tokio::test]
async fn create_over_http_binds_and_boots_without_delete() {
    let stub = HttpStub::start(vec![(200, CREATED_JSON)]).await;
    let api = CloudApi::new(
        ApiSettings::new(stub.endpoint(), "clouddk-test-key")
            .with_retry_unit(Duration::from_millis(1)),
    )
    .expect("client builds");
    let shell = StubConnector::new();
    shell.push_exec(Ok(success_output()));
    let mut server = CloudServer::new(api, shell.clone(), deploy_keys());

    server
        .create(&mut StdRng::seed_from_u64(7), "loc1", "pkg1", "csi-node-a")
        .await
        .expect("create succeeds");

    assert_eq!(server.identifier(), Some("srv-42"));
    assert!(server.is_booted());
    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests.iter().all(|request| request.method != "DELETE"));
    assert_eq!(shell.commands().len(), 1);
    assert_eq!(shell.closed_sessions(), 1);
}

#[tokio::test]
async fn create_over_http_rolls_back_when_server_has_no_interfaces() {
    let stub = HttpStub::start(vec![
        (200, r#"{"identifier": "srv-43", "hostname": "csi-node-b"}"#),
        (200, ""),
    ])
    .await;
    let api = CloudApi::new(
        ApiSettings::new(stub.endpoint(), "clouddk-test-key")
            .with_retry_unit(Duration::from_millis(1)),
    )
    .expect("client builds");
    let mut server = CloudServer::new(api, StubConnector::new(), deploy_keys());

    let err = server
        .create(&mut StdRng::seed_from_u64(7), "loc1", "pkg1", "csi-node-b")
        .await
        .expect_err("server without interfaces is defective");

    assert!(matches!(err, ServerError::ProvisioningDefect { .. }));
    assert!(!server.is_bound());
    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    let delete = requests.get(1).expect("delete request");
    assert_eq!(delete.method, "DELETE");
    assert_eq!(delete.target, "/v1/cloudservers/srv-43");
}

#[tokio::test(start_paused = true)]
async fn create_with_unreachable_server_times_out_and_deletes_once() {
    let api = StubControlPlane::new();
    api.push_create(Ok(reachable_server("srv-1", "csi-node-a")));
    api.push_delete(Ok(()));
    let shell = StubConnector::new();
    shell.always_fail(ShellError::Dial {
        address: ssh_address(),
        message: String::from("connection refused"),
    });
    let mut server = CloudServer::new(api.clone(), shell.clone(), deploy_keys());

    let err = server
        .create(&mut StdRng::seed_from_u64(7), "loc1", "pkg1", "csi-node-a")
        .await
        .expect_err("unreachable server should time out");

    assert!(
        matches!(err, ServerError::ReadinessTimeout { waited_secs: 300, .. }),
        "unexpected error: {err}"
    );
    assert!(!server.is_bound());
    assert_eq!(api.deleted_ids(), vec![String::from("srv-1")]);
    assert_eq!(shell.dials().len(), 30);
    assert!(
        shell
            .dials()
            .iter()
            .all(|(_, credentials)| matches!(credentials, Credentials::Password { .. }))
    );
}

#[tokio::test]
async fn lookup_then_destroy_round_trip() {
    let api = StubControlPlane::new();
    api.push_list(Ok(vec![reachable_server("srv-7", "csi-node-c")]));
    api.push_delete(Ok(()));
    let mut server = CloudServer::new(api.clone(), StubConnector::new(), deploy_keys());

    server
        .initialize_by_hostname("csi-node-c")
        .await
        .expect("lookup succeeds");
    server.destroy().await.expect("destroy succeeds");

    assert!(!server.is_bound());
    assert_eq!(api.deleted_ids(), vec![String::from("srv-7")]);
    assert_eq!(
        server.destroy().await,
        Err(ServerError::NotInitialized),
        "a destroyed handle is unbound"
    );
}
