use crate::parse::{ParseError, ParsedInput, parse_input};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::thread::JoinHandle;
use std::time::Duration;

/// Monotonic submission number. Larger is newer.
pub type Ticket = u64;

struct ParseRequest {
    ticket: Ticket,
    text: String,
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub ticket: Ticket,
    pub text: String,
    pub result: Result<ParsedInput, ParseError>,
}

/// Parses input text off the caller's thread.
///
/// Only the newest queued request is parsed; older ones are skipped. Results come
/// back tagged with their ticket so the caller can ignore anything that is no
/// longer the latest submission.
pub struct ParseWorker {
    requests: Option<Sender<ParseRequest>>,
    results: Receiver<ParseOutcome>,
    handle: Option<JoinHandle<()>>,
    next_ticket: Ticket,
    latest: Option<Ticket>,
}

impl ParseWorker {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = unbounded::<ParseRequest>();
        let (result_tx, result_rx) = unbounded();

        let handle = std::thread::spawn(move || {
            while let Ok(mut request) = request_rx.recv() {
                while let Ok(newer) = request_rx.try_recv() {
                    tracing::debug!("Parse request {} superseded by {}", request.ticket, newer.ticket);
                    request = newer;
                }
                let result = parse_input(&request.text);
                let outcome = ParseOutcome {
                    ticket: request.ticket,
                    text: request.text,
                    result,
                };
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
            next_ticket: 1,
            latest: None,
        }
    }

    pub fn submit(&mut self, text: impl Into<String>) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.latest = Some(ticket);
        if let Some(tx) = &self.requests {
            let _ = tx.send(ParseRequest {
                ticket,
                text: text.into(),
            });
        }
        ticket
    }

    pub fn latest(&self) -> Option<Ticket> {
        self.latest
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest == Some(ticket)
    }

    /// Make every in-flight result stale.
    pub fn cancel_pending(&mut self) {
        self.latest = None;
    }

    /// Next result for the latest ticket, if one is ready. Stale results are dropped.
    pub fn try_take_latest(&mut self) -> Option<ParseOutcome> {
        while let Ok(outcome) = self.results.try_recv() {
            if let Some(outcome) = self.accept(outcome) {
                return Some(outcome);
            }
        }
        None
    }

    /// Block up to `timeout` for the latest ticket's result.
    pub fn wait_latest(&mut self, timeout: Duration) -> Option<ParseOutcome> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
    }

    fn accept(&mut self, outcome: ParseOutcome) -> Option<ParseOutcome> {
        if self.is_latest(outcome.ticket) {
            self.latest = None;
            Some(outcome)
        } else {
            tracing::debug!("Discarding stale parse result {}", outcome.ticket);
            None
        }
    }
}

impl Drop for ParseWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_result_is_delivered() {
        let mut worker = ParseWorker::spawn();
        let ticket = worker.submit(r#"{"a": 1}"#);
        let outcome = worker.wait_latest(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.ticket, ticket);
        assert!(outcome.result.is_ok());
        assert_eq!(worker.latest(), None);
    }

    #[test]
    fn test_superseded_submissions_are_never_delivered() {
        let mut worker = ParseWorker::spawn();
        let first = worker.submit("[1]");
        let second = worker.submit("[1, 2]");
        let third = worker.submit("{ broken");
        assert!(first < second && second < third);

        let outcome = worker.wait_latest(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.ticket, third);
        assert!(outcome.result.is_err());
        assert!(worker.try_take_latest().is_none());
    }

    #[test]
    fn test_cancel_pending_discards_result() {
        let mut worker = ParseWorker::spawn();
        worker.submit("[1]");
        worker.cancel_pending();
        assert!(worker.wait_latest(Duration::from_millis(200)).is_none());
    }
}
