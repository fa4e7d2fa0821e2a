//! # Visibility Signal
//!
//! Reports whether the UI surface hosting the session watcher is currently
//! visible. Hidden surfaces skip polling fetches, and a hidden-to-visible
//! transition ends an authorization cooldown early.
//!
//! The host (a desktop shell, a webview bridge, a terminal front end) owns the
//! `Visibility` and calls [`Visibility::set_visible`]; watchers hold clones.

use tokio::sync::watch;

/// Shared visible/hidden flag
#[derive(Debug, Clone)]
pub struct Visibility {
    tx: watch::Sender<bool>,
}

impl Visibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx }
    }

    /// Visibility for hosts without a notion of hidden surfaces
    pub fn always_visible() -> Self {
        Self::new(true)
    }

    /// Update the flag; watchers are only woken when the value changes
    pub fn set_visible(&self, visible: bool) {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver that observes subsequent changes
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::always_visible()
    }
}

/// Wait until the flag transitions to visible.
///
/// The value current when this is called is treated as already seen, so an
/// already visible surface does not resolve immediately. Returns `false` if
/// the sender was dropped.
pub async fn became_visible(rx: &mut watch::Receiver<bool>) -> bool {
    rx.borrow_and_update();
    loop {
        if rx.changed().await.is_err() {
            return false;
        }
        if *rx.borrow_and_update() {
            return true;
        }
    }
}
