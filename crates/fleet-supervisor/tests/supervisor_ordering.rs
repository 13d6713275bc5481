//! End-to-end reproduction of the declared-order start/stop scenario:
//! `[trace, vector, setup(oneshot, down="echo teardown")]`.

use fleet_supervisor::{Manager, ServiceSpec, ServiceState, ServiceType};
use std::time::Duration;
use tempfile::tempdir;

fn service(name: &str, service_type: ServiceType, up: Option<&str>, down: Option<&str>) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        command: if service_type == ServiceType::Longrun {
            "sleep 30".to_string()
        } else {
            String::new()
        },
        service_type,
        up: up.map(str::to_string),
        down: down.map(str::to_string),
    }
}

async fn wait_until<F>(mut condition: F)
where
    F: AsyncFnMut() -> bool,
{
    for _ in 0..50 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn stop_one_service_leaves_earlier_ones_and_the_daemon_running() {
    let root = tempdir().unwrap();
    let marker = root.path().join("teardown.log");

    let services = vec![
        service("trace", ServiceType::Longrun, None, None),
        service("vector", ServiceType::Longrun, None, None),
        service(
            "setup",
            ServiceType::Oneshot,
            Some("true"),
            Some(&format!("echo teardown >> {}", marker.display())),
        ),
    ];

    let manager = Manager::new(services, root.path()).with_daemon_binary(env!("CARGO_BIN_EXE_svscand"));

    manager.start(None).await.unwrap();
    wait_until(|| async { manager.status(None).await.unwrap().map(|s| s.len()) == Some(2) }).await;

    manager.stop(Some("vector")).await.unwrap();

    let teardown_log = tokio::fs::read_to_string(&marker).await.unwrap();
    assert_eq!(teardown_log, "teardown\n");

    let status = manager.status(None).await.unwrap().expect("daemon still running");
    assert_eq!(status.len(), 1);
    assert_eq!(status["trace"].state, ServiceState::Up);

    manager.stop(None).await.unwrap();
    wait_until(|| async { manager.status(None).await.unwrap().is_none() }).await;

    // The manager keeps no record of what already stopped: a full-set stop
    // walks every declared service from the end, so the oneshot's down
    // command runs again before trace is removed and the daemon shut down.
    let teardown_log = tokio::fs::read_to_string(&marker).await.unwrap();
    assert_eq!(teardown_log, "teardown\nteardown\n");
}
