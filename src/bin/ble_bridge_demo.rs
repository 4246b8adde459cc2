// src/bin/ble_bridge_demo.rs
//! Runs the BLE bridge against the simulated stack: subscribe, power on,
//! advertise on power-on, accept one peer and drop it again.
//!
//! Usage: ble_bridge_demo [config.json]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ble_script_bridge::ble::simulated::SimBleStack;
use ble_script_bridge::ble::{Ble, ADVERTISING_START_EVENT, POWERED_ON, STATE_CHANGE_EVENT};
use ble_script_bridge::{BridgeConfig, FnCallback, ScriptValue};
use tokio::time::sleep;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(Path::new(&path))
            .with_context(|| format!("loading config from {}", path))?,
        None => BridgeConfig::default(),
    };

    let stack = SimBleStack::with_auto_ready();
    let (ble, mut runner) = Ble::new(&config, stack.clone())?;
    let ble = Arc::new(ble);

    let weak = Arc::downgrade(&ble);
    ble.on(
        STATE_CHANGE_EVENT,
        FnCallback::new(move |state| {
            println!("[script] stateChange: {:?}", state);
            if state.as_str() == Some(POWERED_ON) {
                if let Some(ble) = weak.upgrade() {
                    ble.start_advertising()?;
                }
            }
            Ok(ScriptValue::Undefined)
        }),
    )?;

    let advertising = Arc::new(AtomicBool::new(false));
    let advertising_flag = Arc::clone(&advertising);
    ble.on(
        ADVERTISING_START_EVENT,
        FnCallback::new(move |code| {
            println!("[script] advertisingStart: {:?}", code);
            advertising_flag.store(code.as_u32() == Some(0), Ordering::SeqCst);
            Ok(ScriptValue::Undefined)
        }),
    )?;

    ble.enable()?;

    // The script task: drain dispatches until advertising is confirmed.
    for _ in 0..100 {
        runner.drain();
        if advertising.load(Ordering::SeqCst) {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    anyhow::ensure!(advertising.load(Ordering::SeqCst), "advertising never started");

    // A peer connects and leaves, on the stack's own thread.
    let peer_stack = stack.clone();
    std::thread::spawn(move || -> anyhow::Result<()> {
        let conn = peer_stack.connect_peer()?;
        peer_stack.disconnect_peer(&conn, 0x13)?;
        Ok(())
    })
    .join()
    .map_err(|_| anyhow::anyhow!("peer thread panicked"))??;

    println!("Connection state: {:?}", ble.connections().state());

    ble.stop_advertising();
    ble.teardown();
    Ok(())
}
