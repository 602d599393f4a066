//! Simulated worker for trying the monitor without the real workers.
//!
//! ```bash
//! relay-monitor --worker target/debug/relay-worker-sim --show-console
//! ```
//!
//! Attaches to the region named by `-MEM=<token>`, reports a coordinator and
//! resolver coming up, two hosts and a throughput sample every tick. A
//! connect command moves `CONNSTATUS` through negotiating to connected.

use std::thread;
use std::time::{Duration, Instant};

use relay_ipc::{
    app_from_args, token_from_args, ChannelLayout, SharedMemoryChannel, DEFAULT_LOCK_TIMEOUT,
};

const PERIOD: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let token = token_from_args(&args)
        .ok_or_else(|| anyhow::anyhow!("missing -MEM=<token> argument"))?;
    let app = app_from_args(&args);
    let hosting = app.is_some();
    let layout = if hosting {
        ChannelLayout::Single
    } else {
        ChannelLayout::Duplex
    };

    let mut channel = SharedMemoryChannel::attach(token, layout, DEFAULT_LOCK_TIMEOUT)?;
    log::info!("Attached to {} ({:?})", channel.token(), layout);
    if let Some(app) = &app {
        log::info!("Hosting {}", app.display());
    }

    let started = Instant::now();
    let mut conn_status = 0u8;
    let mut negotiating_since: Option<Instant> = None;

    loop {
        let elapsed = started.elapsed().as_secs_f64();

        if layout.command_range().is_some() {
            match channel.take_command() {
                Ok(Some(command)) => {
                    log::info!("Connect requested: {}", command);
                    conn_status = 1;
                    negotiating_since = Some(Instant::now());
                }
                Ok(None) => {}
                Err(e) => log::warn!("Command read failed: {}", e),
            }
        }
        if let Some(since) = negotiating_since {
            if since.elapsed() >= Duration::from_secs(2) {
                conn_status = 2;
                negotiating_since = None;
            }
        }

        let rate = 100.0 + 50.0 * (elapsed / 3.0).sin();
        let status = if hosting {
            format!(
                r#"{{"COORD":{},"RESOLVEDSDP":{},"CONNECTED":{},"NETDATA":{{"OUTGOINGKBS":{:.2},"SECONDTIME":{},"KBSLIMIT":"800"}}}}"#,
                elapsed > 1.0,
                elapsed > 2.0,
                elapsed > 4.0,
                rate,
                elapsed.floor()
            )
        } else {
            format!(
                r#"{{"COORD":{},"RESOLVEDSDP":{},"CONNSTATUS":{},"UPDATETIME":{:.3},"INCOMINGKBS":{:.2},"OUTGOINGKBS":{:.2},"OUTGOINGLIMITKBS":800,"OUTGOINGBUFFERSIZEKB":{:.1},"OUTGOINGMESSAGECOUNT":{},"HOSTS":[{{"GUID":"3f2a","NAME":"studio","APPNAME":"viewer"}},{{"GUID":"9b1c","NAME":"lab","APPNAME":"renderer"}}]}}"#,
                elapsed > 1.0,
                elapsed > 2.0,
                conn_status,
                elapsed,
                rate * 0.8,
                rate,
                rate / 10.0,
                (rate / 5.0).round()
            )
        };

        if let Err(e) = channel.write_status(&status) {
            log::warn!("Status write failed: {}", e);
        }
        thread::sleep(PERIOD);
    }
}
