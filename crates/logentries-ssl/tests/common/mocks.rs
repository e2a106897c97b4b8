// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the TLS intake.

use logentries_ssl::{Connection, Connector, Sleeper};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct IntakeState {
    /// Errors returned by the next write attempts, in order.
    pub failures: VecDeque<ErrorKind>,
    /// Error returned by every write once `failures` is drained.
    pub fail_forever: Option<ErrorKind>,
    pub connects: usize,
    pub closes: usize,
    pub write_attempts: usize,
    pub payloads: Vec<Vec<u8>>,
}

/// A connector whose connections record payloads and fail on cue.
#[derive(Clone, Default)]
pub struct MockIntake {
    pub state: Arc<Mutex<IntakeState>>,
}

impl MockIntake {
    pub fn failing_with(failures: &[ErrorKind]) -> Self {
        let intake = Self::default();
        intake.state().failures = failures.iter().copied().collect();
        intake
    }

    pub fn failing_forever(kind: ErrorKind) -> Self {
        let intake = Self::default();
        intake.state().fail_forever = Some(kind);
        intake
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, IntakeState> {
        self.state.lock().expect("lock poisoned")
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.state().payloads.clone()
    }
}

pub struct MockConnection {
    state: Arc<Mutex<IntakeState>>,
}

impl Write for MockConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.write_attempts += 1;
        if let Some(kind) = state.failures.pop_front().or(state.fail_forever) {
            return Err(io::Error::new(kind, "mock intake failure"));
        }
        state.payloads.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connection for MockConnection {
    fn shutdown(&mut self) -> io::Result<()> {
        self.state.lock().expect("lock poisoned").closes += 1;
        Ok(())
    }
}

impl Connector for MockIntake {
    type Connection = MockConnection;

    fn connect(&self) -> io::Result<MockConnection> {
        self.state().connects += 1;
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }

    fn endpoint(&self) -> String {
        "mock-intake:443".to_string()
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("lock poisoned").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.lock().expect("lock poisoned").push(duration);
    }
}
