use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use batcher_hardware::{ControllerLink, HwError, LinkOptions};
use batcher_traits::{MonotonicClock, RelayLink, WeightFeed};

fn wait_for(mut cond: impl FnMut() -> bool, limit: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn options(port: u16) -> LinkOptions {
    LinkOptions {
        addr: format!("127.0.0.1:{port}"),
        reconnect: Duration::from_millis(100),
        connect_timeout: Duration::from_millis(500),
    }
}

#[test]
fn relays_and_weights_flow_over_the_link() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let link = ControllerLink::spawn(options(port), MonotonicClock::new());

    let (mut server, _) = listener.accept().unwrap();
    assert!(wait_for(|| link.is_connected(), Duration::from_secs(2)));

    let mut relays = link.relays();
    relays.set_relay("dump_material", true, Some(8)).unwrap();

    let mut reader = BufReader::new(server.try_clone().unwrap());
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let v: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(v["type"], "relay_control");
    assert_eq!(v["relay"], "dump_material");
    assert_eq!(v["gpio_pin"], 8);

    server
        .write_all(b"{\"type\":\"weight_update\",\"timestamp\":1,\"weights\":{\"pasir\":10,\"batu\":0,\"semen\":0,\"air\":0}}\n")
        .unwrap();
    server
        .write_all(b"{\"type\":\"weight_update\",\"timestamp\":2,\"weights\":{\"pasir\":42.5,\"batu\":1,\"semen\":0,\"air\":0}}\n")
        .unwrap();

    let mut feed = link.feed();
    let mut last = None;
    assert!(wait_for(
        || {
            if let Ok(Some(w)) = feed.latest() {
                last = Some(w);
            }
            last.is_some_and(|w| (w.pasir - 42.5).abs() < 1e-9)
        },
        Duration::from_secs(2)
    ));
}

#[test]
fn disconnect_is_reported_and_link_recovers() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let link = ControllerLink::spawn(options(port), MonotonicClock::new());

    let (server, _) = listener.accept().unwrap();
    assert!(wait_for(|| link.is_connected(), Duration::from_secs(2)));
    drop(server);
    assert!(wait_for(|| !link.is_connected(), Duration::from_secs(2)));

    let mut relays = link.relays();
    let err = relays.set_relay("mixer", true, None).expect_err("offline");
    assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Disconnected)));
    let mut feed = link.feed();
    assert!(!feed.is_live());
    assert!(feed.latest().is_err());

    // Backoff elapses and the link dials again
    let (_server2, _) = listener.accept().unwrap();
    assert!(wait_for(|| link.is_connected(), Duration::from_secs(2)));
}

#[test]
fn drop_joins_thread_without_a_peer() {
    // Nothing listens on this port; the thread sits in backoff and must still exit.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let start = Instant::now();
    {
        let link = ControllerLink::spawn(options(port), MonotonicClock::new());
        thread::sleep(Duration::from_millis(30));
        assert!(!link.is_connected());
    }
    assert!(start.elapsed() < Duration::from_secs(2));
}
