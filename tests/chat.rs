mod common;

use common::{localhost_server, pump_cycles, pump_until};

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::rc::Rc;
use std::time::Duration;

use tcp_reactor::chat::{ChatRoom, GREETING};

struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(endpoint: tcp_reactor::Endpoint) -> Self {
        let stream = TcpStream::connect(endpoint.to_socket_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());

        Self { stream, reader }
    }

    fn say(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).unwrap();
    }

    fn hear(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();

        line
    }
}

#[test]
fn first_message_names_the_user_and_later_ones_are_broadcast() {
    let (mut server, endpoint) = localhost_server();
    let room = Rc::new(RefCell::new(ChatRoom::new()));
    server.set_delegate(room.clone());

    let mut alice = Client::connect(endpoint);
    assert!(pump_until(&mut server, |server| server.connection_count() == 1));
    assert_eq!(alice.hear(), format!("{GREETING}\n"));

    let descriptor = server.connections().next().unwrap().descriptor();
    assert_eq!(room.borrow().user_name(descriptor), None);

    alice.say("alice\n");
    assert!(pump_until(&mut server, |_| room.borrow().user_count() == 1));
    assert_eq!(room.borrow().user_name(descriptor), Some("alice"));
    assert_eq!(alice.hear(), "alice joined the chat\n");

    let mut bob = Client::connect(endpoint);
    assert!(pump_until(&mut server, |server| server.connection_count() == 2));
    assert_eq!(bob.hear(), format!("{GREETING}\n"));

    bob.say("  bob \r\n");
    assert!(pump_until(&mut server, |_| room.borrow().user_count() == 2));
    assert_eq!(alice.hear(), "bob joined the chat\n");
    assert_eq!(bob.hear(), "bob joined the chat\n");

    alice.say("hello\n");
    pump_cycles(&mut server, 5);
    assert_eq!(alice.hear(), "<alice> hello\n");
    assert_eq!(bob.hear(), "<alice> hello\n");
}

#[test]
fn blank_lines_are_ignored_and_departed_users_forgotten() {
    let (mut server, endpoint) = localhost_server();
    let room = Rc::new(RefCell::new(ChatRoom::new()));
    server.set_delegate(room.clone());

    let mut carol = Client::connect(endpoint);
    assert!(pump_until(&mut server, |server| server.connection_count() == 1));
    assert_eq!(carol.hear(), format!("{GREETING}\n"));

    carol.say(" \t\r\n");
    pump_cycles(&mut server, 5);
    assert_eq!(room.borrow().user_count(), 0);

    carol.say("carol\n");
    assert!(pump_until(&mut server, |_| room.borrow().user_count() == 1));
    assert_eq!(carol.hear(), "carol joined the chat\n");

    drop(carol);
    assert!(pump_until(&mut server, |server| server.connection_count() == 0));
    assert_eq!(room.borrow().user_count(), 0);
}
