use std::net::SocketAddr;
use std::time::{Duration, Instant};

use pile_common::{Config, Transport};
use socket_pile::engine::endpoint::Endpoint;
use socket_pile::error::PileError;
use socket_pile::orchestrator::{run, wait_for_gate};
use socket_pile::{Acceptor, PileReport};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

mod support;
use support::LogBuffer;

fn run_config(workers: usize, duration: Duration) -> Config {
    Config {
        transport: Transport::Tcp,
        address: "127.0.0.1:0".to_string(),
        workers,
        duration,
        ..Config::default()
    }
}

fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_stream_pile() {
    let hold = Duration::from_millis(300);
    let config = run_config(10, hold);

    let started = Instant::now();
    let summary = timeout(Duration::from_secs(10), run(&config, tokio::io::empty()))
        .await
        .expect("run should finish after the hold")
        .unwrap();

    assert_eq!(summary.report, PileReport { connected: 10, failed: 0 });
    assert_eq!(summary.accepted, Some(10));
    assert!(summary.held_for >= hold);
    assert!(started.elapsed() >= hold);
    match summary.target {
        Endpoint::Inet(addr) => assert_ne!(addr.port(), 0),
        other => panic!("unexpected target {}", other),
    }
}

#[tokio::test]
async fn test_dial_only_run_with_nothing_listening() {
    let config = Config {
        address: closed_port().to_string(),
        listen: false,
        ..run_config(5, Duration::from_millis(100))
    };

    let summary = timeout(Duration::from_secs(5), run(&config, tokio::io::empty()))
        .await
        .expect("failures must not hang the run")
        .unwrap();

    assert_eq!(summary.report, PileReport { connected: 0, failed: 5 });
    assert_eq!(summary.accepted, None);
    assert!(summary.held_for >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_dial_only_run_logs_every_failure() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let config = Config {
        address: closed_port().to_string(),
        listen: false,
        ..run_config(5, Duration::from_millis(50))
    };
    let summary = timeout(Duration::from_secs(5), run(&config, tokio::io::empty()))
        .await
        .expect("failures must not hang the run")
        .unwrap();

    assert_eq!(summary.report.failed, 5);
    assert_eq!(logs.count_lines("Dial failed"), 5);
    assert_eq!(logs.count_lines("piled up 5 clients"), 1);
    assert_eq!(logs.count_lines("wait for 50ms"), 1);
    assert_eq!(logs.count_lines("done."), 1);
}

#[tokio::test]
async fn test_zero_workers_goes_straight_to_holding() {
    let config = run_config(0, Duration::ZERO);
    let summary = timeout(Duration::from_secs(1), run(&config, tokio::io::empty()))
        .await
        .expect("nothing to pile")
        .unwrap();
    assert_eq!(summary.report.total(), 0);
    assert_eq!(summary.accepted, Some(0));
}

#[tokio::test]
async fn test_bind_failure_aborts_before_any_dial() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    occupied.set_nonblocking(true).unwrap();
    let config = Config {
        address: occupied.local_addr().unwrap().to_string(),
        ..run_config(5, Duration::from_secs(60))
    };

    let started = Instant::now();
    let res = run(&config, tokio::io::empty()).await;
    assert!(matches!(res, Err(PileError::Bind(_))));
    assert!(started.elapsed() < Duration::from_secs(5));

    // No worker ever reached the occupied port.
    let err = occupied.accept().err().expect("no pending connection");
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = Config {
        address: String::new(),
        ..run_config(1, Duration::ZERO)
    };
    assert!(matches!(
        run(&config, tokio::io::empty()).await,
        Err(PileError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_port_can_be_rebound_after_run() {
    let summary = run(&run_config(3, Duration::from_millis(50)), tokio::io::empty())
        .await
        .unwrap();
    assert_eq!(summary.report.connected, 3);

    let again = Acceptor::bind(Transport::Tcp, &summary.target, 16)
        .await
        .expect("listener must be released");
    again.shutdown().await;
}

#[tokio::test]
async fn test_gate_blocks_until_input() {
    let (mut tx, mut rx) = tokio::io::duplex(8);
    let waiter = tokio::spawn(async move { wait_for_gate(&mut rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    tx.write_all(b"\n").await.unwrap();
    timeout(Duration::from_secs(1), waiter)
        .await
        .expect("gate should open")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_gate_opens_on_eof() {
    let mut closed = tokio::io::empty();
    timeout(Duration::from_millis(100), wait_for_gate(&mut closed))
        .await
        .expect("eof opens the gate")
        .unwrap();
}

#[tokio::test]
async fn test_gated_run_proceeds_after_signal() {
    let config = Config {
        gate: true,
        ..run_config(2, Duration::ZERO)
    };
    let summary = timeout(Duration::from_secs(5), run(&config, &b"go\n"[..]))
        .await
        .expect("gate input is already available")
        .unwrap();
    assert_eq!(summary.report.connected, 2);
}

#[tokio::test]
async fn test_datagram_run() {
    let config = Config {
        transport: Transport::Udp4,
        ..run_config(4, Duration::ZERO)
    };
    let summary = run(&config, tokio::io::empty()).await.unwrap();
    assert_eq!(summary.report, PileReport { connected: 4, failed: 0 });
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_run_cleans_up_socket_file() {
    let dir = temp_dir::TempDir::new().unwrap();
    let path = dir.child("pile.sock");
    let config = Config {
        transport: Transport::Unix,
        address: path.to_string_lossy().into_owned(),
        ..run_config(4, Duration::from_millis(50))
    };

    let summary = run(&config, tokio::io::empty()).await.unwrap();
    assert_eq!(summary.report, PileReport { connected: 4, failed: 0 });
    assert!(!path.exists());
}
