#![allow(dead_code)]

use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tcp_reactor::{Connection, ConnectionHandle, Descriptor, Endpoint, Server, ServerDelegate};

pub const DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Opened {
        descriptor: Descriptor,
        local: Endpoint,
        remote: Endpoint,
    },
    Closed(Descriptor),
    Data {
        descriptor: Descriptor,
        byte_count: usize,
        text: String,
    },
    CanSend(Descriptor),
}

/// Delegate that logs every callback and drains incoming data.
#[derive(Default)]
pub struct Recorder {
    pub records: Vec<Record>,
    pub handles: Vec<ConnectionHandle>,
    pub close_after_data: bool,
}

impl Recorder {
    pub fn shared() -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder::default()))
    }

    pub fn opened(&self) -> Vec<Descriptor> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Opened { descriptor, .. } => Some(*descriptor),
                _ => None,
            })
            .collect()
    }

    pub fn closed(&self) -> Vec<Descriptor> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Closed(descriptor) => Some(*descriptor),
                _ => None,
            })
            .collect()
    }

    pub fn received(&self) -> String {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Data { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn data_records(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record, Record::Data { .. }))
            .count()
    }

    pub fn can_send_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record, Record::CanSend(_)))
            .count()
    }
}

impl ServerDelegate for Recorder {
    fn connection_opened(&mut self, connection: &mut Connection) {
        self.handles.push(connection.handle());
        self.records.push(Record::Opened {
            descriptor: connection.descriptor(),
            local: connection.local_endpoint(),
            remote: connection.remote_endpoint(),
        });
    }

    fn connection_closed(&mut self, connection: &Connection) {
        self.records.push(Record::Closed(connection.descriptor()));
    }

    fn data_received(&mut self, connection: &mut Connection, byte_count: usize) {
        let text = connection.read_string().unwrap();
        self.records.push(Record::Data {
            descriptor: connection.descriptor(),
            byte_count,
            text,
        });

        if self.close_after_data {
            connection.request_close();
        }
    }

    fn can_send_data(&mut self, connection: &mut Connection, _byte_count: usize) {
        self.records.push(Record::CanSend(connection.descriptor()));
    }
}

pub fn localhost(port: u16) -> Endpoint {
    Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// A server on an OS-assigned loopback port, and the endpoint it bound.
pub fn localhost_server() -> (Server, Endpoint) {
    let server = Server::new(localhost(0)).expect("server should start");
    let (_, endpoint) = server.local_endpoints().next().unwrap();

    (server, endpoint)
}

/// Runs poll cycles until `done` holds or the deadline passes.
pub fn pump_until(server: &mut Server, mut done: impl FnMut(&Server) -> bool) -> bool {
    let started = Instant::now();

    while started.elapsed() < DEADLINE {
        if done(server) {
            return true;
        }
        server
            .handle_events_timeout(Duration::from_millis(20))
            .expect("poll cycle should succeed");
    }

    done(server)
}

pub fn pump_cycles(server: &mut Server, cycles: usize) {
    for _ in 0..cycles {
        server
            .handle_events_timeout(Duration::from_millis(20))
            .expect("poll cycle should succeed");
    }
}
