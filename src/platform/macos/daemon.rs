// SPDX-License-Identifier: GPL-3.0-only
//! Long-running display daemon
//!
//! The AppKit application loop owns the main thread, which is also the only
//! thread that touches the controller. Everything else reaches it through
//! the main dispatch queue:
//!
//! - CoreGraphics reconfiguration callbacks schedule a refresh.
//! - Command lines read from stdin on a tokio runtime are parsed and sent over.
//!
//! State changes are logged from the runtime as they are published.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use dispatch2::DispatchQueue;
use objc2::MainThreadMarker;
use objc2_app_kit::{
    NSApplication, NSApplicationActivationPolicy, NSEvent, NSEventModifierFlags, NSEventType,
};
use objc2_core_graphics::{
    CGDirectDisplayID, CGDisplayChangeSummaryFlags, CGDisplayRegisterReconfigurationCallback,
    CGDisplayRemoveReconfigurationCallback, CGError,
};
use objc2_foundation::NSPoint;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::config::Config;
use crate::controller::{Command, Controller};
use crate::events::StateChange;
use crate::overlay::OverlayManager;

use super::overlay::AppKitHost;

thread_local! {
    static CONTROLLER: RefCell<Option<Controller>> = const { RefCell::new(None) };
}

/// Set while a reconfiguration refresh is queued, so bursts collapse into one
static REFRESH_PENDING: AtomicBool = AtomicBool::new(false);

/// Run `command` on the main queue
fn dispatch(command: Command) {
    DispatchQueue::main().exec_async(move || handle(command));
}

/// Must be called on the main thread
fn handle(command: Command) {
    CONTROLLER.with(|cell| match cell.borrow_mut().as_mut() {
        Some(controller) => {
            let outcome = controller.handle(command);
            info!(%outcome, "Command handled");
        }
        None => warn!("Controller not ready, dropping command"),
    });
}

unsafe extern "C-unwind" fn on_reconfigured(
    display: CGDirectDisplayID,
    flags: CGDisplayChangeSummaryFlags,
    _user_info: *mut std::ffi::c_void,
) {
    if flags.contains(CGDisplayChangeSummaryFlags::BeginConfigurationFlag) {
        return;
    }
    let display_id = display;
    debug!(display_id, flags = flags.0, "Display reconfigured");
    if !REFRESH_PENDING.swap(true, Ordering::AcqRel) {
        DispatchQueue::main().exec_async(|| {
            REFRESH_PENDING.store(false, Ordering::Release);
            handle(Command::Refresh);
        });
    }
}

/// Run the daemon until stdin sends `quit` or the process is terminated
///
/// On `quit` the application loop is stopped and the reconfiguration
/// callback, runtime and controller are torn down before returning.
pub fn run_daemon(config: &Config) -> anyhow::Result<()> {
    let mtm = MainThreadMarker::new().context("the display daemon must run on the main thread")?;
    let app = NSApplication::sharedApplication(mtm);
    app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);

    let engine = super::open_engine(config);
    engine.capabilities().resolve_all();
    let changes = engine.subscribe();
    let overlays = OverlayManager::new(Box::new(AppKitHost::new(mtm)), config.max_dimming);
    let mut controller = Controller::new(engine, overlays, config);
    controller.handle(Command::Refresh);
    CONTROLLER.with(|cell| *cell.borrow_mut() = Some(controller));

    // SAFETY: the callback is a plain function with no user data.
    let status = unsafe {
        CGDisplayRegisterReconfigurationCallback(Some(on_reconfigured), std::ptr::null_mut())
    };
    if status != CGError::Success {
        anyhow::bail!("CGDisplayRegisterReconfigurationCallback failed with {}", status.0);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("hikari-io")
        .enable_all()
        .build()
        .context("failed to start the command runtime")?;
    runtime.spawn(log_changes(changes));
    runtime.spawn(read_commands());

    info!("Display daemon running, reading commands from stdin");
    app.run();

    // SAFETY: same pair registered above.
    unsafe {
        CGDisplayRemoveReconfigurationCallback(Some(on_reconfigured), std::ptr::null_mut());
    }
    runtime.shutdown_background();
    CONTROLLER.with(|cell| cell.borrow_mut().take());
    info!("Display daemon stopped");
    Ok(())
}

async fn log_changes(mut changes: watch::Receiver<StateChange>) {
    while changes.changed().await.is_ok() {
        let change = *changes.borrow_and_update();
        info!(
            generation = change.generation,
            reason = ?change.reason,
            "Display state changed"
        );
    }
}

/// Why the command reader stopped
#[derive(Debug, PartialEq, Eq)]
enum InputEnd {
    Quit,
    Closed,
}

/// Forward stdin commands until `quit`; a closed stdin leaves the daemon running
async fn read_commands() {
    let stdin = BufReader::new(tokio::io::stdin());
    if forward_commands(stdin, dispatch).await == InputEnd::Quit {
        DispatchQueue::main().exec_async(|| {
            if let Some(mtm) = MainThreadMarker::new() {
                stop_application(&NSApplication::sharedApplication(mtm));
            }
        });
    }
}

async fn forward_commands(
    input: impl AsyncBufRead + Unpin,
    mut send: impl FnMut(Command),
) -> InputEnd {
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line == "quit" {
                    return InputEnd::Quit;
                }
                if line.is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => send(command),
                    Err(e) => warn!("{e}"),
                }
            }
            Ok(None) => {
                info!("stdin closed, no further commands");
                return InputEnd::Closed;
            }
            Err(e) => {
                error!("Failed to read command: {e}");
                return InputEnd::Closed;
            }
        }
    }
}

/// Leave `app.run()` so the daemon can clean up
///
/// `stop:` only takes effect once the loop finishes its current event, so
/// an application-defined event is posted to wake it.
fn stop_application(app: &NSApplication) {
    // SAFETY: called on the main thread with a plain application-defined
    // event that carries no graphics context.
    unsafe {
        app.stop(None);
        let wake = NSEvent::otherEventWithType_location_modifierFlags_timestamp_windowNumber_context_subtype_data1_data2(
            NSEventType::ApplicationDefined,
            NSPoint::new(0.0, 0.0),
            NSEventModifierFlags::empty(),
            0.0,
            0,
            None,
            0,
            0,
            0,
        );
        match wake {
            Some(event) => app.postEvent_atStart(&event, true),
            None => warn!("Could not create wake event, daemon stops on the next event"),
        }
    }
}
