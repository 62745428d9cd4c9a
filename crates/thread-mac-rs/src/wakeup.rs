// crates/thread-mac-rs/src/wakeup.rs
//! Transmission of wake-up frame sequences to a device that samples the
//! channel at a very low duty cycle.
//!
//! A session repeats one fixed-length multipurpose frame at a fixed interval.
//! Each frame tells the receiver, through its Rendezvous Time IE, how long
//! to wait for the end of the sequence before it starts listening.

use crate::common::Deadline;
use crate::config::WakeupConfig;
use crate::frame::ie::{ConnectionIe, RendezvousTimeIe, write_wakeup_ies};
use crate::frame::{Frame, FrameType, FrameVersion};
use crate::hal::MacError;
use crate::mac::WakeupFrameSink;
use crate::types::{ExtAddress, MacAddress, PanId};
use log::{debug, info, trace, warn};

/// Retry spacing, in wake-up intervals, advertised in the Connection IE.
pub const C_CONNECTION_RETRY_INTERVAL: u8 = 1;
/// Connection attempts advertised in the Connection IE.
pub const C_CONNECTION_RETRY_COUNT: u8 = 12;
/// Bytes moved over the host-to-radio bus for one radio frame.
pub const C_RADIO_FRAME_BUS_BYTES: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupState {
    Idle,
    Running,
}

/// Lead time between the request of a timed transmission and its air time.
pub fn frame_request_ahead_us(config: &WakeupConfig) -> u64 {
    let bus_transfer_us = match config.bus_speed_hz {
        0 => 0,
        hz => (C_RADIO_FRAME_BUS_BYTES * 8 * 1_000_000).div_ceil(hz as u64),
    };
    config.csl_request_ahead_us + bus_transfer_us + config.bus_latency_us
}

/// Schedules the frames of a wake-up session.
#[derive(Debug, Clone)]
pub struct WakeupTxScheduler {
    config: WakeupConfig,
    request_ahead_us: u64,
    pan_id: PanId,
    ext_address: ExtAddress,

    target: ExtAddress,
    interval_us: u64,
    next_tx_us: u64,
    tx_end_us: u64,
    timer: Deadline,
    state: WakeupState,
    sequence: u8,

    sent_frames: u32,
    skipped_frames: u32,
}

impl WakeupTxScheduler {
    pub fn new(config: WakeupConfig) -> Self {
        Self {
            request_ahead_us: frame_request_ahead_us(&config),
            config,
            pan_id: PanId::BROADCAST,
            ext_address: ExtAddress::default(),
            target: ExtAddress::default(),
            interval_us: 0,
            next_tx_us: 0,
            tx_end_us: 0,
            timer: Deadline::new(),
            state: WakeupState::Idle,
            sequence: 0,
            sent_frames: 0,
            skipped_frames: 0,
        }
    }

    pub fn set_link_addresses(&mut self, pan_id: PanId, ext_address: ExtAddress) {
        self.pan_id = pan_id;
        self.ext_address = ext_address;
    }

    /// Starts a session waking `target`.
    ///
    /// The first frame goes on air one request-ahead time from now. Frames
    /// follow every `interval_us` until `duration_ms` after the first.
    pub fn wake_up(
        &mut self,
        current_time_us: u64,
        target: ExtAddress,
        interval_us: u16,
        duration_ms: u16,
    ) -> Result<(), MacError> {
        if self.state == WakeupState::Running {
            return Err(MacError::InvalidState);
        }
        if interval_us == 0 || duration_ms == 0 {
            return Err(MacError::InvalidArgs);
        }
        self.target = target;
        self.interval_us = interval_us as u64;
        self.next_tx_us = current_time_us + self.request_ahead_us;
        self.tx_end_us = self.next_tx_us + duration_ms as u64 * 1_000;
        self.timer.start_at(current_time_us);
        self.state = WakeupState::Running;
        info!(
            "[Wakeup] Waking {} every {}us until {}us",
            target, self.interval_us, self.tx_end_us
        );
        Ok(())
    }

    /// Ends the session. Does nothing when no session runs.
    pub fn stop(&mut self) {
        if self.state == WakeupState::Running {
            debug!("[Wakeup] Stopped");
        }
        self.timer.stop();
        self.state = WakeupState::Idle;
    }

    /// Recomputes the request-ahead time after the platform timing changed.
    /// A running session applies it from its next frame on.
    pub fn update_frame_request_ahead(&mut self, config: WakeupConfig) {
        self.request_ahead_us = frame_request_ahead_us(&config);
        self.config = config;
        if self.state == WakeupState::Running {
            self.timer.start_at(self.next_tx_us.saturating_sub(self.request_ahead_us));
        }
        trace!("[Wakeup] Request ahead {}us", self.request_ahead_us);
    }

    /// Requests the due wake-up frame, if any, and schedules the next one.
    pub fn tick(&mut self, current_time_us: u64, sink: &mut dyn WakeupFrameSink) {
        if !self.timer.fire(current_time_us) {
            return;
        }
        let tx_time_us = self.next_tx_us;

        if tx_time_us <= current_time_us {
            debug!("[Wakeup] Missed frame at {}us", tx_time_us);
            self.skipped_frames += 1;
        } else {
            let frame = self.build_frame(tx_time_us);
            match sink.transmit_wakeup_frame(current_time_us, &frame, tx_time_us) {
                Ok(()) => {
                    self.sent_frames += 1;
                    self.sequence = self.sequence.wrapping_add(1);
                }
                Err(MacError::Busy) => {
                    trace!("[Wakeup] Radio busy, skipping frame at {}us", tx_time_us);
                    self.skipped_frames += 1;
                }
                Err(e) => {
                    warn!("[Wakeup] Frame at {}us failed: {}", tx_time_us, e);
                    self.skipped_frames += 1;
                }
            }
        }

        // --- Next frame ---
        self.next_tx_us = tx_time_us + self.interval_us;
        if self.next_tx_us >= self.tx_end_us {
            info!(
                "[Wakeup] Session ended: {} sent, {} skipped",
                self.sent_frames, self.skipped_frames
            );
            self.state = WakeupState::Idle;
            return;
        }
        self.timer.start_at(self.next_tx_us.saturating_sub(self.request_ahead_us));
    }

    fn build_frame(&self, tx_time_us: u64) -> Frame {
        let rendezvous = RendezvousTimeIe {
            rendezvous_time_us: self.tx_end_us.saturating_sub(tx_time_us),
            wakeup_interval_us: self.interval_us,
        };
        let connection = ConnectionIe {
            retry_interval: C_CONNECTION_RETRY_INTERVAL,
            retry_count: C_CONNECTION_RETRY_COUNT,
        };
        Frame {
            frame_type: FrameType::Multipurpose,
            version: FrameVersion::V2015,
            sequence: self.sequence,
            dst_pan_id: Some(self.pan_id),
            dst: MacAddress::Extended(self.target),
            src_pan_id: Some(self.pan_id),
            src: MacAddress::Extended(self.ext_address),
            header_ies: write_wakeup_ies(&rendezvous, &connection),
            ..Frame::default()
        }
    }

    // --- Queries ---

    pub fn state(&self) -> WakeupState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == WakeupState::Running
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timer.deadline()
    }

    pub fn frame_request_ahead_us(&self) -> u64 {
        self.request_ahead_us
    }

    /// Air time after which no further wake-up frame is sent.
    pub fn tx_end_time_us(&self) -> u64 {
        self.tx_end_us
    }

    /// How long the woken device keeps trying to connect after the session.
    pub fn connection_window_us(&self) -> u64 {
        self.interval_us * C_CONNECTION_RETRY_INTERVAL as u64 * C_CONNECTION_RETRY_COUNT as u64
    }

    pub fn sent_frames(&self) -> u32 {
        self.sent_frames
    }

    /// Frames not sent because the radio was busy or the time had passed.
    pub fn skipped_frames(&self) -> u32 {
        self.skipped_frames
    }

    pub fn config(&self) -> &WakeupConfig {
        &self.config
    }
}
