//! Recording projector client

use sony_sdcp_projector::{ClientError, ClientFactory, ClientResult, ProjectorClient};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call received by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetPower,
    SetPower(bool),
    SetHdmiInput(u8),
    SetScreen(String, String),
}

impl Call {
    pub fn screen(category: &str, mode: &str) -> Self {
        Call::SetScreen(category.to_string(), mode.to_string())
    }
}

/// How every call fails while a failure is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Refused,
    Timeout,
    Protocol,
}

impl Failure {
    fn to_error(self) -> ClientError {
        match self {
            Failure::Refused => ClientError::ConnectionRefused {
                host: "mock".to_string(),
            },
            Failure::Timeout => ClientError::Io(io::Error::from(io::ErrorKind::TimedOut)),
            Failure::Protocol => ClientError::Protocol("unexpected response".to_string()),
        }
    }
}

#[derive(Debug)]
struct MockState {
    calls: Vec<Call>,
    power: bool,
    acknowledge: bool,
    failure: Option<Failure>,
    failing_calls: Vec<Call>,
    latency: Duration,
}

/// Projector client that records calls and answers from scripted state
#[derive(Debug)]
pub struct MockProjector {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProjector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                power: false,
                acknowledge: true,
                failure: None,
                failing_calls: Vec::new(),
                latency: Duration::ZERO,
            }),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn powered_on() -> Self {
        let projector = Self::new();
        projector.set_power_state(true);
        projector
    }

    pub fn set_power_state(&self, on: bool) {
        self.state.lock().unwrap().power = on;
    }

    /// Whether setters report success
    pub fn set_acknowledge(&self, acknowledge: bool) {
        self.state.lock().unwrap().acknowledge = acknowledge;
    }

    /// Fail every call until cleared
    pub fn fail_with(&self, failure: Failure) {
        self.state.lock().unwrap().failure = Some(failure);
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().failure = None;
    }

    /// Fail only calls equal to `call`
    pub fn fail_call(&self, call: Call) {
        self.state.lock().unwrap().failing_calls.push(call);
    }

    /// Block every call for `latency` before answering
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = latency;
    }

    /// Most calls ever running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, call: Call) -> ClientResult<MockSnapshot> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let latency = self.state.lock().unwrap().latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        let result = self.answer(call);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn answer(&self, call: Call) -> ClientResult<MockSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if let Some(failure) = state.failure {
            return Err(failure.to_error());
        }
        if state.failing_calls.contains(&call) {
            return Err(Failure::Protocol.to_error());
        }
        Ok(MockSnapshot {
            power: state.power,
            acknowledge: state.acknowledge,
        })
    }
}

impl Default for MockProjector {
    fn default() -> Self {
        Self::new()
    }
}

struct MockSnapshot {
    power: bool,
    acknowledge: bool,
}

impl ProjectorClient for MockProjector {
    fn get_power(&self) -> ClientResult<bool> {
        Ok(self.record(Call::GetPower)?.power)
    }

    fn set_power(&self, on: bool) -> ClientResult<bool> {
        let snapshot = self.record(Call::SetPower(on))?;
        if snapshot.acknowledge {
            self.set_power_state(on);
        }
        Ok(snapshot.acknowledge)
    }

    fn set_hdmi_input(&self, input: u8) -> ClientResult<bool> {
        Ok(self.record(Call::SetHdmiInput(input))?.acknowledge)
    }

    fn set_screen(&self, category: &str, mode: &str) -> ClientResult<bool> {
        Ok(self.record(Call::screen(category, mode))?.acknowledge)
    }
}

/// Hands out one [`MockProjector`] per host and remembers every creation
#[derive(Debug, Default)]
pub struct MockFactory {
    projectors: Mutex<HashMap<String, Arc<MockProjector>>>,
    created: Mutex<Vec<String>>,
    refuse: Mutex<bool>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `projector` for the next client created for `host`
    pub fn insert(&self, host: &str, projector: Arc<MockProjector>) {
        self.projectors
            .lock()
            .unwrap()
            .insert(host.to_string(), projector);
    }

    /// The projector serving `host`, created on first use
    pub fn projector(&self, host: &str) -> Arc<MockProjector> {
        self.projectors
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(MockProjector::powered_on()))
            .clone()
    }

    /// Make client creation fail
    pub fn refuse_clients(&self) {
        *self.refuse.lock().unwrap() = true;
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, host: &str) -> ClientResult<Arc<dyn ProjectorClient>> {
        if *self.refuse.lock().unwrap() {
            return Err(ClientError::Protocol(format!("no route to {host}")));
        }
        self.created.lock().unwrap().push(host.to_string());
        Ok(self.projector(host))
    }
}
