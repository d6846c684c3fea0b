//! Prints IPv4 address changes until interrupted.
//!
//! ```text
//! RUST_LOG=debug cargo run --example watch
//! ```

use std::time::Duration;

use anyhow::Context;
use log::info;

use netlink_poller::{AddressChange, IfaddrMonitor};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut monitor = IfaddrMonitor::builder()
        .socket_recv_buffer(1 << 20)
        .dump_on_start(true)
        .build()
        .context("failed to start address monitor")?;
    info!("listening on {:?}", monitor.socket());

    let mut sink = |change: AddressChange| println!("{}", change);
    loop {
        monitor
            .run_once(&mut sink, Some(Duration::from_secs(60)))
            .context("address monitor failed")?;
        info!("{:?}", monitor.stats());
    }
}
