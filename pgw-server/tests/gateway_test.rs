use std::{
    collections::HashSet,
    fs,
    io::Write,
    net::{SocketAddr, UdpSocket},
    path::Path,
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

use pgw_server::{imsi, Config, Gateway, PgwError, SessionControl};
use rand::Rng;
use tempfile::TempDir;

/// ------------------------------------------------------------
/// Helpers
/// ------------------------------------------------------------
fn test_config(dir: &TempDir) -> Config {
    Config {
        udp_ip: "127.0.0.1".into(),
        udp_port: 0,
        cdr_file: dir.path().join("cdr.log").to_string_lossy().into_owned(),
        graceful_shutdown_rate: 1,
        sweep_interval_ms: 50,
        ..Config::default()
    }
}

/// Send `payload` and wait for the reply, retrying on timeout.
fn exchange(server: SocketAddr, payload: &[u8]) -> String {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut buf = [0u8; 64];
    for _ in 0..3 {
        socket.send_to(payload, server).unwrap();
        if let Ok(n) = socket.recv(&mut buf) {
            return String::from_utf8_lossy(&buf[..n]).into_owned();
        }
    }
    panic!("no reply from {server}");
}

fn admit(server: SocketAddr, id: &str) -> String {
    exchange(server, &imsi::encode(id).unwrap())
}

fn cdr_lines(path: &Path) -> Vec<(String, String)> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 3, "bad CDR line {line:?}");
            (fields[1].to_string(), fields[2].to_string())
        })
        .collect()
}

fn random_imsi(rng: &mut impl Rng) -> String {
    (0..imsi::IMSI_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// ------------------------------------------------------------
/// Admission over UDP
/// ------------------------------------------------------------
#[test]
fn single_admission_then_duplicate() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let gateway = Gateway::start(&config).unwrap();
    let addr = gateway.udp_addr();

    assert_eq!(admit(addr, "001010123456789"), "created");
    assert_eq!(admit(addr, "001010123456789"), "rejected");
    assert!(gateway.sessions().has_session("001010123456789"));

    gateway.shutdown();
    let lines = cdr_lines(Path::new(&config.cdr_file));
    assert_eq!(
        lines,
        vec![
            ("001010123456789".to_string(), "created".to_string()),
            ("001010123456789".to_string(), "deleted".to_string()),
        ]
    );
}

#[test]
fn malformed_payload_is_rejected_without_billing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let gateway = Gateway::start(&config).unwrap();

    assert_eq!(exchange(gateway.udp_addr(), b"abc"), "rejected");
    assert_eq!(admit(gateway.udp_addr(), "12345"), "rejected");
    assert!(gateway.sessions().is_empty());

    gateway.shutdown();
    assert!(cdr_lines(Path::new(&config.cdr_file)).is_empty());
}

#[test]
fn blacklisted_subscriber_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        blacklist: vec!["001010000000001".into()],
        ..test_config(&dir)
    };
    let gateway = Gateway::start(&config).unwrap();

    assert_eq!(admit(gateway.udp_addr(), "001010000000001"), "rejected");
    assert_eq!(admit(gateway.udp_addr(), "001010000000002"), "created");
    assert!(!gateway.sessions().has_session("001010000000001"));

    gateway.shutdown();
    let billed: HashSet<String> = cdr_lines(Path::new(&config.cdr_file))
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert!(!billed.contains("001010000000001"));
}

#[test]
fn hundred_concurrent_clients_are_all_created() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let gateway = Gateway::start(&config).unwrap();
    let addr = gateway.udp_addr();

    let barrier = Arc::new(Barrier::new(100));
    let clients: Vec<_> = (0..100)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let id = format!("00101{:010}", i);
                barrier.wait();
                (admit(addr, &id), id)
            })
        })
        .collect();

    for client in clients {
        let (reply, id) = client.join().unwrap();
        assert_eq!(reply, "created", "{id}");
    }
    assert_eq!(gateway.sessions().len(), 100);

    assert_eq!(gateway.shutdown(), 100);
    let lines = cdr_lines(Path::new(&config.cdr_file));
    assert_eq!(lines.iter().filter(|(_, a)| a == "created").count(), 100);
    assert_eq!(lines.iter().filter(|(_, a)| a == "deleted").count(), 100);
}

#[test]
fn random_subscribers_are_billed_in_lifecycle_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let gateway = Gateway::start(&config).unwrap();

    let mut rng = rand::thread_rng();
    let ids: HashSet<String> = (0..25).map(|_| random_imsi(&mut rng)).collect();
    for id in &ids {
        assert_eq!(admit(gateway.udp_addr(), id), "created");
    }
    gateway.shutdown();

    let lines = cdr_lines(Path::new(&config.cdr_file));
    assert_eq!(lines.len(), ids.len() * 2);
    for id in &ids {
        let actions: Vec<&str> = lines
            .iter()
            .filter(|(line_id, _)| line_id == id)
            .map(|(_, action)| action.as_str())
            .collect();
        assert_eq!(actions, ["created", "deleted"], "{id}");
    }
}

/// ------------------------------------------------------------
/// Expiry and shutdown
/// ------------------------------------------------------------
#[test]
fn session_expires_and_can_be_readmitted() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        session_timeout_sec: 1,
        ..test_config(&dir)
    };
    let gateway = Gateway::start(&config).unwrap();
    let addr = gateway.udp_addr();

    assert_eq!(admit(addr, "310150123456789"), "created");
    thread::sleep(Duration::from_millis(1500));
    assert!(!gateway.sessions().has_session("310150123456789"));
    assert_eq!(admit(addr, "310150123456789"), "created");

    gateway.shutdown();
    let actions: Vec<String> = cdr_lines(Path::new(&config.cdr_file))
        .into_iter()
        .map(|(_, action)| action)
        .collect();
    assert_eq!(actions, ["created", "deleted", "created", "deleted"]);
}

#[test]
fn shutdown_paces_the_drain_and_closes_the_port() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        graceful_shutdown_rate: 20,
        ..test_config(&dir)
    };
    let gateway = Gateway::start(&config).unwrap();
    let addr = gateway.udp_addr();
    for i in 0..10 {
        assert_eq!(admit(addr, &format!("2620100000000{:02}", i)), "created");
    }

    let sessions = gateway.sessions();
    let started = Instant::now();
    assert_eq!(gateway.shutdown(), 10);
    assert!(started.elapsed() >= Duration::from_millis(9 * 20));
    assert!(sessions.is_empty());
    assert!(!sessions.create_session("262010000000099"));

    // The port is released with the gateway.
    UdpSocket::bind(addr).unwrap();
}

/// ------------------------------------------------------------
/// Startup failures
/// ------------------------------------------------------------
#[test]
fn unopenable_cdr_file_fails_startup() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        cdr_file: dir
            .path()
            .join("missing")
            .join("cdr.log")
            .to_string_lossy()
            .into_owned(),
        ..test_config(&dir)
    };
    assert!(matches!(
        Gateway::start(&config),
        Err(PgwError::CdrOpen { .. })
    ));
}

#[test]
fn busy_udp_port_fails_startup() {
    let dir = TempDir::new().unwrap();
    let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
    let config = Config {
        udp_port: taken.local_addr().unwrap().port(),
        ..test_config(&dir)
    };
    assert!(matches!(
        Gateway::start(&config),
        Err(PgwError::Bind { .. })
    ));
}

#[test]
fn gateway_starts_from_config_file() {
    let dir = TempDir::new().unwrap();
    let cdr = dir.path().join("billing.log");
    let path = dir.path().join("config.json");
    let mut file = fs::File::create(&path).unwrap();
    write!(
        file,
        r#"{{
            "udp_ip": "127.0.0.1",
            "udp_port": 0,
            "session_timeout_sec": 30,
            "cdr_file": {:?},
            "graceful_shutdown_rate": 1,
            "blacklist": ["001010123456789", 42]
        }}"#,
        cdr.to_string_lossy()
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    let gateway = Gateway::start(&config).unwrap();
    assert_eq!(admit(gateway.udp_addr(), "001010123456789"), "rejected");
    assert_eq!(admit(gateway.udp_addr(), "001010123456780"), "created");
    gateway.shutdown();

    assert_eq!(cdr_lines(&cdr).len(), 2);
}
