//! Scale link reconciliation against the operator's link switch.
//!
//! Run once per tick. Transport errors never leave this module: they are
//! logged and reported as "still disconnected", and the next tick retries.
use shot_traits::ScaleLink;

use crate::config::LinkCfg;
use crate::hw_error::map_link_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl LinkState {
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, LinkState::Connected)
    }
}

/// Drive the link one step toward `should_connect`.
pub fn reconcile<L: ScaleLink + ?Sized>(link: &mut L, should_connect: bool, cfg: &LinkCfg) -> LinkState {
    let connected = link.is_connected();
    match (should_connect, connected) {
        (true, false) => try_connect(link, cfg),
        (false, true) => {
            if let Err(e) = link.disconnect() {
                let err = map_link_error(&*e);
                tracing::error!(error = %err, "scale disconnect failed");
            } else {
                tracing::info!("scale disconnected by switch");
            }
            LinkState::Disconnected
        }
        (_, true) => LinkState::Connected,
        (_, false) => LinkState::Disconnected,
    }
}

fn try_connect<L: ScaleLink + ?Sized>(link: &mut L, cfg: &LinkCfg) -> LinkState {
    let devices = match link.discover(cfg.discover_timeout) {
        Ok(d) => d,
        Err(e) => {
            let err = map_link_error(&*e);
            tracing::error!(error = %err, "scale discovery failed");
            return LinkState::Disconnected;
        }
    };
    let Some(address) = pick_address(&devices, cfg.preferred_address.as_deref()) else {
        tracing::debug!("no scales found");
        return LinkState::Disconnected;
    };
    link.set_address(address);
    tracing::info!(address, "connecting to scale");
    match link.connect() {
        Ok(()) => LinkState::Connected,
        Err(e) => {
            let err = map_link_error(&*e);
            tracing::error!(address, error = %err, "failed to connect to scale");
            LinkState::Disconnected
        }
    }
}

fn pick_address<'a>(devices: &'a [String], preferred: Option<&str>) -> Option<&'a str> {
    preferred
        .and_then(|want| devices.iter().find(|d| d.eq_ignore_ascii_case(want)))
        .or_else(|| devices.first())
        .map(String::as_str)
}
