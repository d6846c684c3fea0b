use std::thread;
use std::time::{Duration, Instant};

use log::warn;

use netlink_poller::netlink::{NetlinkSocket, RTMGRP_IPV4_IFADDR};
use netlink_poller::{AddressChange, ChangeKind, IfaddrMonitor, MonitorState};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn monitor() -> Option<IfaddrMonitor> {
    match IfaddrMonitor::new() {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            // sandboxes without netlink
            warn!("skipping: {}", e);
            None
        }
    }
}

#[test]
fn dump_reports_loopback() {
    init();
    let mut monitor = match monitor() {
        Some(monitor) => monitor,
        None => return,
    };

    monitor.request_dump().unwrap();

    let mut changes = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let mut sink = |change: AddressChange| changes.push(change);
        monitor
            .run_once(&mut sink, Some(Duration::from_millis(100)))
            .unwrap();
        if changes.iter().any(|c| c.address.is_loopback()) {
            break;
        }
    }

    assert_eq!(monitor.state(), MonitorState::Idle);
    let stats = monitor.stats();
    assert!(stats.reads > 0);
    // containers may not configure 127.0.0.1
    if let Some(lo) = changes.iter().find(|c| c.address.is_loopback()) {
        assert_eq!(lo.kind, ChangeKind::Added);
        assert!(lo.interface_index > 0);
    }
    assert_eq!(stats.added as usize, changes.len());
}

#[test]
fn idle_monitor_times_out() {
    init();
    let mut monitor = match monitor() {
        Some(monitor) => monitor,
        None => return,
    };

    let mut sink = |_: AddressChange| {};
    let n = monitor
        .run_once(&mut sink, Some(Duration::from_millis(0)))
        .unwrap();
    assert_eq!(n, 0);
    assert_eq!(monitor.state(), MonitorState::Idle);
}

#[test]
fn handle_stops_run() {
    init();
    let mut monitor = match monitor() {
        Some(monitor) => monitor,
        None => return,
    };

    let handle = monitor.handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.shutdown().unwrap();
    });

    let start = Instant::now();
    let mut sink = |_: AddressChange| {};
    monitor.run(&mut sink).unwrap();
    stopper.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn socket_reports_binding() {
    init();
    let socket = match NetlinkSocket::bind(RTMGRP_IPV4_IFADDR) {
        Ok(socket) => socket,
        Err(e) => {
            warn!("skipping: {}", e);
            return;
        }
    };
    assert_eq!(socket.groups(), RTMGRP_IPV4_IFADDR);
    assert_eq!(socket.buffer_len(), 64 * 1024);
    assert_ne!(socket.port(), 0);
}
