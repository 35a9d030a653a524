//! Tray for Windows and macOS: a `tray-icon` menu driven by a `tao` event
//! loop on the main thread.
//!
//! Snapshots and menu clicks reach the loop as user events, so the loop can
//! sleep in `ControlFlow::Wait` between refreshes.

use super::{tooltip_text, TRAY_ID};
use crate::refresh::Snapshot;
use crate::shutdown::Shutdown;
use anyhow::Result;
use image::RgbaImage;
use std::sync::Arc;
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tao::platform::run_return::EventLoopExtRunReturn;
use tokio::sync::watch;
use tokio::task;
use tracing::{debug, warn};
use tray_icon::menu::{Menu, MenuEvent, MenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

#[cfg(target_os = "macos")]
use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};

#[derive(Debug)]
enum TrayMessage {
    Snapshot(Arc<Snapshot>),
    Menu(MenuEvent),
    Shutdown,
}

pub async fn handle_tray(
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    stop: Shutdown,
) -> Result<()> {
    let initial = Arc::clone(&snapshots.borrow_and_update());

    let mut event_loop = EventLoopBuilder::<TrayMessage>::with_user_event().build();

    // No dock icon, no menu bar.
    #[cfg(target_os = "macos")]
    event_loop.set_activation_policy(ActivationPolicy::Accessory);

    let menu_proxy = event_loop.create_proxy();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = menu_proxy.send_event(TrayMessage::Menu(event));
    }));
    tokio::spawn(forward_snapshots(
        snapshots,
        stop.clone(),
        event_loop.create_proxy(),
    ));

    let label = MenuItem::new(&initial.label, false, None);
    let exit = MenuItem::new("Exit", true, None);
    let menu = Menu::new();
    menu.append_items(&[&label, &exit])?;

    let mut tray: Option<TrayIcon> = None;
    let mut failure = None;

    // The event loop owns this thread until shutdown.
    task::block_in_place(|| {
        event_loop.run_return(|event, _, control_flow| {
            if *control_flow != ControlFlow::Exit {
                *control_flow = ControlFlow::Wait;
            }

            match event {
                // Some platforms only accept a tray once the loop is running.
                Event::NewEvents(StartCause::Init) => match build_tray(&menu, &initial) {
                    Ok(icon) => tray = Some(icon),
                    Err(e) => {
                        failure = Some(e.context("Unable to spawn the tray icon"));
                        stop.trigger();
                        *control_flow = ControlFlow::Exit;
                    }
                },
                Event::UserEvent(TrayMessage::Snapshot(snapshot)) => {
                    label.set_text(&snapshot.label);
                    if let Some(tray) = &tray {
                        if let Err(e) = show_snapshot(tray, &snapshot) {
                            warn!(error = %e, "Unable to update the tray icon");
                        }
                    }
                }
                Event::UserEvent(TrayMessage::Menu(event)) => {
                    if event.id() == exit.id() {
                        debug!("Exit selected");
                        stop.trigger();
                    }
                }
                Event::UserEvent(TrayMessage::Shutdown) => {
                    debug!("Shutting down tray event loop");
                    *control_flow = ControlFlow::Exit;
                }
                _ => {}
            }
        });
    });

    MenuEvent::set_event_handler::<fn(MenuEvent)>(None);
    drop(tray);

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Relays new snapshots into the event loop and wakes it for shutdown.
async fn forward_snapshots(
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    mut stop: Shutdown,
    proxy: EventLoopProxy<TrayMessage>,
) {
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Refresh loop gone; closing tray");
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                if proxy.send_event(TrayMessage::Snapshot(snapshot)).is_err() {
                    return;
                }
            }
            () = stop.recv() => break,
        }
    }
    let _ = proxy.send_event(TrayMessage::Shutdown);
}

fn build_tray(menu: &Menu, snapshot: &Snapshot) -> Result<TrayIcon> {
    let tray = TrayIconBuilder::new()
        .with_id(TRAY_ID)
        .with_menu(Box::new(menu.clone()))
        .with_tooltip(tooltip_text(snapshot))
        .with_icon(tray_image(&snapshot.icon)?)
        .build()?;
    Ok(tray)
}

fn show_snapshot(tray: &TrayIcon, snapshot: &Snapshot) -> Result<()> {
    tray.set_icon(Some(tray_image(&snapshot.icon)?))?;
    tray.set_tooltip(Some(tooltip_text(snapshot)))?;
    Ok(())
}

/// `tray-icon` takes straight RGBA rows, the same layout `image` keeps.
pub fn tray_image(image: &RgbaImage) -> Result<Icon> {
    Ok(Icon::from_rgba(
        image.as_raw().clone(),
        image.width(),
        image.height(),
    )?)
}
