//! Mock discovery backends for unit testing.
//!
//! Allow tests to drive both sources with scripted updates without
//! radio hardware or a network attachment.

use std::net::IpAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::probe::{HostReply, NetworkProber, ProbeError, ProbeUpdate};
use super::radio::{Advertisement, Radio, RadioError, RadioUpdate};

/// A mock [`Radio`] that lets tests inject advertisement updates.
pub struct MockRadio {
    powered: AtomicBool,
    updates: Mutex<Option<mpsc::UnboundedSender<RadioUpdate>>>,
    stop_calls: AtomicUsize,
}

impl MockRadio {
    pub fn powered_on() -> Self {
        Self {
            powered: AtomicBool::new(true),
            updates: Mutex::new(None),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn powered_off() -> Self {
        let radio = Self::powered_on();
        radio.powered.store(false, Ordering::SeqCst);
        radio
    }

    pub fn set_powered(&self, on: bool) {
        self.powered.store(on, Ordering::SeqCst);
    }

    /// Injects a raw update, as if received from hardware.
    ///
    /// Panics if no scan is running.
    pub fn inject(&self, update: RadioUpdate) {
        let guard = self.updates.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(update);
            }
            None => panic!("MockRadio::inject called before start_scan()"),
        }
    }

    /// Injects one advertisement.
    pub fn advertise(&self, peripheral_id: Uuid, local_name: Option<&str>, rssi: i16) {
        self.inject(RadioUpdate::Advertisement(Advertisement {
            peripheral_id,
            local_name: local_name.map(str::to_string),
            rssi,
        }));
    }

    /// Injects a mid-scan backend failure.
    pub fn fail(&self, reason: &str) {
        self.inject(RadioUpdate::Failed(reason.to_string()));
    }

    /// Ends the update stream, as if the backend ran out of work.
    pub fn end_stream(&self) {
        *self.updates.lock().expect("lock poisoned") = None;
    }

    /// Returns how many times `stop_scan` was called.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl Radio for MockRadio {
    fn is_powered_on(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    fn start_scan(&self) -> Result<mpsc::UnboundedReceiver<RadioUpdate>, RadioError> {
        if !self.is_powered_on() {
            return Err(RadioError::Backend("radio is powered off".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.updates.lock().expect("lock poisoned") = Some(tx);
        Ok(rx)
    }

    fn stop_scan(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.updates.lock().expect("lock poisoned") = None;
    }
}

/// A mock [`NetworkProber`] that lets tests inject sweep updates.
pub struct MockProber {
    attached: AtomicBool,
    updates: Mutex<Option<mpsc::UnboundedSender<ProbeUpdate>>>,
    stop_calls: AtomicUsize,
}

impl MockProber {
    pub fn attached() -> Self {
        Self {
            attached: AtomicBool::new(true),
            updates: Mutex::new(None),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn detached() -> Self {
        let prober = Self::attached();
        prober.attached.store(false, Ordering::SeqCst);
        prober
    }

    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::SeqCst);
    }

    /// Injects a raw update, as if produced by a sweep.
    ///
    /// Panics if no sweep is running.
    pub fn inject(&self, update: ProbeUpdate) {
        let guard = self.updates.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(update);
            }
            None => panic!("MockProber::inject called before start_sweep()"),
        }
    }

    /// Injects one host reply.
    pub fn report_host(
        &self,
        address: &str,
        hardware_address: Option<&str>,
        hostname: Option<&str>,
    ) {
        let address: IpAddr = address.parse().expect("test address must parse");
        self.inject(ProbeUpdate::Host(HostReply {
            address,
            hardware_address: hardware_address.map(str::to_string),
            hostname: hostname.map(str::to_string),
        }));
    }

    /// Injects a sweep progress report.
    pub fn report_progress(&self, value: f64) {
        self.inject(ProbeUpdate::Progress(value));
    }

    /// Completes the sweep naturally.
    pub fn complete_sweep(&self) {
        self.inject(ProbeUpdate::Complete);
    }

    /// Injects a mid-sweep backend failure.
    pub fn fail(&self, reason: &str) {
        self.inject(ProbeUpdate::Failed(reason.to_string()));
    }

    /// Returns how many times `stop_sweep` was called.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl NetworkProber for MockProber {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn start_sweep(&self) -> Result<mpsc::UnboundedReceiver<ProbeUpdate>, ProbeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.updates.lock().expect("lock poisoned") = Some(tx);
        Ok(rx)
    }

    fn stop_sweep(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.updates.lock().expect("lock poisoned") = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
