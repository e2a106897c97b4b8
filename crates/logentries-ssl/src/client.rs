// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ownership of the single intake connection.

use std::io::{self, Write};
use tracing::{debug, trace};

/// A live stream to the intake.
pub trait Connection: Write {
    /// Ends the stream politely before it is dropped.
    fn shutdown(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Opens connections to the intake.
pub trait Connector {
    type Connection: Connection;

    /// Establishes a new connection. Errors are returned as-is, without retrying.
    fn connect(&self) -> io::Result<Self::Connection>;

    /// Human readable destination, for logs.
    fn endpoint(&self) -> String;
}

/// Holds at most one connection, created lazily on first use.
///
/// Closing drops the connection; the next write opens a new one.
pub struct DeliveryClient<C: Connector> {
    connector: C,
    connection: Option<C::Connection>,
}

impl<C: Connector> DeliveryClient<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: None,
        }
    }

    /// Returns the current connection, opening one if there is none.
    pub fn connection(&mut self) -> io::Result<&mut C::Connection> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                debug!("Creating connection to {}", self.connector.endpoint());
                self.connector.connect()?
            }
        };
        Ok(self.connection.insert(connection))
    }

    /// Writes one payload, opening a connection first if needed.
    pub fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        let connection = self.connection()?;
        connection.write_all(payload)?;
        connection.flush()?;
        trace!("Wrote {} bytes", payload.len());
        Ok(())
    }

    /// Drops the current connection. Closing an absent connection is a no-op.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            debug!("Closing connection to {}", self.connector.endpoint());
            if let Err(e) = connection.shutdown() {
                debug!("Error while closing connection: {e}");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> Drop for DeliveryClient<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::ErrorKind;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        connects: usize,
        shutdowns: usize,
        written: Vec<u8>,
        refuse: bool,
    }

    struct MockConnection(Rc<RefCell<Log>>);

    impl Write for MockConnection {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connection for MockConnection {
        fn shutdown(&mut self) -> io::Result<()> {
            self.0.borrow_mut().shutdowns += 1;
            Ok(())
        }
    }

    struct MockConnector(Rc<RefCell<Log>>);

    impl Connector for MockConnector {
        type Connection = MockConnection;

        fn connect(&self) -> io::Result<MockConnection> {
            let mut log = self.0.borrow_mut();
            if log.refuse {
                return Err(io::Error::new(ErrorKind::ConnectionRefused, "refused"));
            }
            log.connects += 1;
            Ok(MockConnection(Rc::clone(&self.0)))
        }

        fn endpoint(&self) -> String {
            "mock:443".to_string()
        }
    }

    fn client() -> (DeliveryClient<MockConnector>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        (DeliveryClient::new(MockConnector(Rc::clone(&log))), log)
    }

    #[test]
    fn test_connection_is_lazy_and_reused() {
        let (mut client, log) = client();
        assert!(!client.is_connected());
        assert_eq!(log.borrow().connects, 0);

        client.write(b"one").unwrap();
        client.write(b"two").unwrap();

        assert!(client.is_connected());
        assert_eq!(log.borrow().connects, 1);
        assert_eq!(log.borrow().written, b"onetwo");
    }

    #[test]
    fn test_close_is_idempotent_and_reconnects() {
        let (mut client, log) = client();
        client.close();
        assert_eq!(log.borrow().shutdowns, 0);

        client.write(b"one").unwrap();
        client.close();
        client.close();
        assert!(!client.is_connected());
        assert_eq!(log.borrow().shutdowns, 1);

        client.write(b"two").unwrap();
        assert_eq!(log.borrow().connects, 2);
    }

    #[test]
    fn test_connect_errors_propagate_unmodified() {
        let (mut client, log) = client();
        log.borrow_mut().refuse = true;

        let err = client.write(b"one").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_drop_closes_connection() {
        let (mut client, log) = client();
        client.connection().unwrap();
        drop(client);
        assert_eq!(log.borrow().shutdowns, 1);
    }
}
