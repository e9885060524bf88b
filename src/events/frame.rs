//! Single-slot frame handshake between the simulation and render units.
//!
//! [`frame_channel`] returns the two ends of the handshake:
//! - [`FrameProducer`] lives on the simulation unit. At the end of a step it
//!   signals a frame (carrying the background color) and blocks until the
//!   render unit tells it to run the next step.
//! - [`FrameConsumer`] lives on the render unit. Each refresh tick it checks
//!   for a pending frame, draws it, then advances the simulation exactly once.
//!
//! Both directions are `bounded(1)` crossbeam channels, so there is never
//! more than one frame in flight and the simulation cannot run ahead of the
//! renderer.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use log::warn;
use std::time::Duration;

use crate::components::color::Color;
use crate::error::SyncError;

/// Build a connected producer/consumer pair.
///
/// `timeout` bounds how long [`FrameProducer::wait_for_advance`] blocks;
/// `None` waits forever.
pub fn frame_channel(timeout: Option<Duration>) -> (FrameProducer, FrameConsumer) {
    let (tx_ready, rx_ready) = bounded(1);
    let (tx_advance, rx_advance) = bounded(1);
    (
        FrameProducer {
            tx_ready,
            rx_advance,
            timeout,
            awaiting: false,
        },
        FrameConsumer { rx_ready, tx_advance },
    )
}

/// Simulation side of the handshake.
pub struct FrameProducer {
    tx_ready: Sender<Color>,
    rx_advance: Receiver<()>,
    timeout: Option<Duration>,
    awaiting: bool,
}

impl FrameProducer {
    /// Mark a frame ready for presentation.
    ///
    /// Fails with [`SyncError::FramePending`] if the previous frame has not
    /// been answered with an advance yet; the pending color is kept.
    pub fn signal_frame(&mut self, background: Color) -> Result<(), SyncError> {
        if self.awaiting {
            warn!("frame signalled while the previous one is still pending");
            return Err(SyncError::FramePending);
        }
        match self.tx_ready.try_send(background) {
            Ok(()) => {
                self.awaiting = true;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SyncError::FramePending),
            Err(TrySendError::Disconnected(_)) => Err(SyncError::Disconnected),
        }
    }

    /// Block until the render unit has presented the signalled frame.
    pub fn wait_for_advance(&mut self) -> Result<(), SyncError> {
        let received = match self.timeout {
            Some(limit) => self.rx_advance.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => SyncError::Timeout(limit),
                RecvTimeoutError::Disconnected => SyncError::Disconnected,
            }),
            None => self.rx_advance.recv().map_err(|_| SyncError::Disconnected),
        };
        if received.is_ok() {
            self.awaiting = false;
        }
        received
    }

    /// Signal a frame and wait for the render unit to consume it.
    pub fn end_frame(&mut self, background: Color) -> Result<(), SyncError> {
        self.signal_frame(background)?;
        self.wait_for_advance()
    }

    /// True between `signal_frame` and the matching advance.
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Render side of the handshake.
pub struct FrameConsumer {
    rx_ready: Receiver<Color>,
    tx_advance: Sender<()>,
}

impl FrameConsumer {
    /// Take the pending frame, if any. Taking it clears the slot.
    pub fn poll(&self) -> Result<Option<Color>, SyncError> {
        match self.rx_ready.try_recv() {
            Ok(color) => Ok(Some(color)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SyncError::Disconnected),
        }
    }

    /// Like [`poll`](Self::poll), treating a gone producer as "no frame".
    pub fn take_ready(&self) -> Option<Color> {
        self.poll().ok().flatten()
    }

    /// Let the simulation run its next step. Called once per taken frame.
    pub fn advance(&self) -> Result<(), SyncError> {
        match self.tx_advance.try_send(()) {
            Ok(()) => Ok(()),
            // An unread advance already releases the producer.
            Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => Err(SyncError::Disconnected),
        }
    }
}
