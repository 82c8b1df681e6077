//! A latch the mocks use to hold async calls until a test lets them finish.

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    pub(crate) fn closed() -> Self {
        let (open, _rx) = watch::channel(false);
        Self { open }
    }

    pub(crate) fn open(&self) {
        self.open.send_replace(true);
    }

    pub(crate) fn waiter(&self) -> watch::Receiver<bool> {
        self.open.subscribe()
    }
}

/// Waits until the gate behind `rx` opens. Returns immediately if the gate
/// was dropped.
pub(crate) async fn pass(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|open| *open).await;
}
