//! The line-exchange script.
//!
//! The exchange is a fixed linear sequence of buffered-socket operations;
//! the per-byte state tables live inside the socket operations themselves,
//! so the script reduces to a dispatch over its resume points.

use std::io;

use crate::runtime::sock::{LineSock, Transport};
use crate::runtime::task::Step;

/// Sent as soon as the peer connects.
pub const GREETING: &str = "Welcome, please type something and press return.\n";
/// Prefix of the reply line.
pub const REPLY_LABEL: &str = "Got the following data: ";
/// Sent after the captured bytes; ends the exchange.
pub const FAREWELL: &str = "Good bye!\r\n";
/// Input line terminator.
pub const DELIMITER: u8 = b'\n';

/// Resume points of the exchange, one per suspension.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Sending the greeting.
    #[default]
    Greeting,
    /// Waiting for a delimiter-terminated line.
    AwaitingLine,
    /// Sending the reply label.
    ReplyLabel,
    /// Sending the captured bytes.
    ReplyData,
    /// Sending the farewell.
    Farewell,
    /// Close requested; nothing left to do.
    Done,
}

/// Drive the exchange from its current resume point. Returns `Pending` the
/// moment an operation has to wait on the transport; consecutive steps
/// complete within a single call when the transport allows.
pub fn step<T: Transport>(
    point: &mut Exchange,
    sock: &mut LineSock,
    transport: &mut T,
) -> io::Result<Step> {
    loop {
        match *point {
            Exchange::Greeting => {
                if sock.send_text(transport, GREETING)? == Step::Pending {
                    return Ok(Step::Pending);
                }
                sock.begin_read();
                *point = Exchange::AwaitingLine;
            }
            Exchange::AwaitingLine => {
                if sock.read_until(transport, DELIMITER)? == Step::Pending {
                    return Ok(Step::Pending);
                }
                *point = Exchange::ReplyLabel;
            }
            Exchange::ReplyLabel => {
                if sock.send_text(transport, REPLY_LABEL)? == Step::Pending {
                    return Ok(Step::Pending);
                }
                *point = Exchange::ReplyData;
            }
            Exchange::ReplyData => {
                if sock.send_captured(transport)? == Step::Pending {
                    return Ok(Step::Pending);
                }
                *point = Exchange::Farewell;
            }
            Exchange::Farewell => {
                if sock.send_text(transport, FAREWELL)? == Step::Pending {
                    return Ok(Step::Pending);
                }
                sock.close(transport);
                *point = Exchange::Done;
            }
            Exchange::Done => return Ok(Step::Complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::sock::fake::FakeTransport;
    use crate::runtime::task::Task;

    fn expected_reply(data: &[u8]) -> Vec<u8> {
        let mut reply = Vec::new();
        reply.extend_from_slice(GREETING.as_bytes());
        reply.extend_from_slice(REPLY_LABEL.as_bytes());
        reply.extend_from_slice(data);
        reply.extend_from_slice(FAREWELL.as_bytes());
        reply
    }

    #[test]
    fn test_whole_exchange_in_one_advance() {
        let mut transport = FakeTransport::new();
        transport.push_bytes(b"hello\n");

        let mut sock = LineSock::new(10);
        let mut task: Task<Exchange> = Task::start();

        let outcome = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(outcome.unwrap(), Step::Complete);
        assert!(task.is_finished());

        assert_eq!(transport.outbound, expected_reply(b"hello"));
        assert!(transport.closed);
    }

    #[test]
    fn test_greeting_precedes_any_read() {
        let mut transport = FakeTransport::new();
        transport.set_write_budget(Some(0));
        transport.push_bytes(b"early\n");

        let mut sock = LineSock::new(10);
        let mut task: Task<Exchange> = Task::start();

        // transport refuses the greeting, so the script must hold there
        let first = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(first.unwrap(), Step::Pending);
        assert_eq!(transport.reads, 0);
        assert!(transport.outbound.is_empty());

        transport.set_write_budget(None);
        let second = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(second.unwrap(), Step::Complete);
        assert_eq!(transport.outbound, expected_reply(b"early"));
    }

    #[test]
    fn test_suspends_across_fragmented_input_without_replay() {
        let mut transport = FakeTransport::new();
        transport.push_bytes(b"he");

        let mut sock = LineSock::new(10);
        let mut task: Task<Exchange> = Task::start();

        let first = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(first.unwrap(), Step::Pending);
        assert_eq!(transport.outbound, GREETING.as_bytes());

        transport.push_bytes(b"llo\n");
        let second = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(second.unwrap(), Step::Complete);

        // exactly one greeting: completed sends are never replayed
        assert_eq!(transport.outbound, expected_reply(b"hello"));
    }

    #[test]
    fn test_overlong_line_is_truncated_in_reply() {
        let mut transport = FakeTransport::new();
        transport.push_bytes(b"0123456789ABCDE\n");

        let mut sock = LineSock::new(10);
        let mut task: Task<Exchange> = Task::start();

        let outcome = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(outcome.unwrap(), Step::Complete);
        assert_eq!(transport.outbound, expected_reply(b"0123456789"));
    }

    #[test]
    fn test_empty_line_yields_empty_capture() {
        let mut transport = FakeTransport::new();
        transport.push_bytes(b"\n");

        let mut sock = LineSock::new(10);
        let mut task: Task<Exchange> = Task::start();

        let outcome = task.advance(|point| step(point, &mut sock, &mut transport));
        assert_eq!(outcome.unwrap(), Step::Complete);
        assert_eq!(transport.outbound, expected_reply(b""));
    }

    #[test]
    fn test_peer_eof_mid_script_errors_and_leaves_task_unfinished() {
        let mut transport = FakeTransport::new();
        transport.push_eof();

        let mut sock = LineSock::new(10);
        let mut task: Task<Exchange> = Task::start();

        let result = task.advance(|point| step(point, &mut sock, &mut transport));
        assert!(result.is_err());
        assert!(!task.is_finished());
        assert!(!transport.closed);
    }
}
