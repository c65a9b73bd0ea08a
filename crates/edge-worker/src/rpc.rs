//! Worker RPC Handler
//!
//! Implements the stdin/stdout JSON handler for the worker entrypoint:
//!
//!   edge-worker serve --root DIR
//!
//! The handler reads one JSON envelope per line from stdin, dispatches it to
//! the cache worker, and writes exactly one JSON response line to stdout.
//! Blank lines are skipped; EOF ends the session.

use std::io::{self, BufRead, Write};

use edge_protocol::{WorkerError, WorkerRequest, WorkerResponse};

use crate::dispatcher;
use crate::worker::CacheWorker;

/// Line-oriented RPC handler.
pub struct RpcHandler {
    worker: CacheWorker,
}

impl RpcHandler {
    pub fn new(worker: CacheWorker) -> Self {
        Self { worker }
    }

    pub fn worker(&self) -> &CacheWorker {
        &self.worker
    }

    /// Run the RPC handler, reading from stdin and writing to stdout.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with_io(&mut stdin.lock(), &mut stdout.lock())
    }

    /// Run the RPC handler with custom I/O (for testing).
    pub fn run_with_io<R: BufRead, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
    ) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = match parse_request(&line) {
                Ok(request) => dispatcher::dispatch(&mut self.worker, &request),
                // Unparseable lines get an error response with an empty request ID
                Err(e) => WorkerResponse::error(String::new(), e),
            };
            write_response(writer, &response)?;
        }
    }
}

fn parse_request(line: &str) -> Result<WorkerRequest, WorkerError> {
    serde_json::from_str(line).map_err(|e| WorkerError::invalid_request(format!("invalid JSON: {}", e)))
}

fn write_response<W: Write>(writer: &mut W, response: &WorkerResponse) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::WorkerConfig;
    use crate::network::OfflineNetwork;
    use crate::store::MemoryStorage;
    use edge_protocol::ErrorCode;
    use std::io::Cursor;
    use std::sync::Arc;

    fn create_handler() -> RpcHandler {
        let worker = CacheWorker::new(
            WorkerConfig::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(OfflineNetwork),
            Arc::new(SystemClock),
        )
        .unwrap();
        RpcHandler::new(worker)
    }

    fn run(input: &str) -> Vec<WorkerResponse> {
        let mut handler = create_handler();
        let mut reader = Cursor::new(input.to_string());
        let mut output = Vec::new();
        handler.run_with_io(&mut reader, &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_one_response_per_line() {
        let responses = run(concat!(
            r#"{"request_id":"a","op":"status"}"#,
            "\n\n",
            r#"{"request_id":"b","op":"message","payload":{"type":"GET_CACHE_STATS"}}"#,
            "\n"
        ));
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].request_id, "a");
        assert!(responses[0].ok);
        assert_eq!(responses[0].payload.as_ref().unwrap()["state"], "PARSED");
        assert!(responses[1].ok);
    }

    #[test]
    fn test_invalid_json() {
        let responses = run("not valid json\n");
        assert_eq!(responses.len(), 1);
        assert!(!responses[0].ok);
        assert_eq!(responses[0].error.as_ref().unwrap().code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_fetch_before_activation_passes_through() {
        let responses = run(concat!(
            r#"{"request_id":"f","op":"fetch","payload":{"url":"http://localhost:3000/rest/v1/pets"}}"#,
            "\n"
        ));
        // Offline and not activated: the network error surfaces untouched
        assert_eq!(responses[0].error.as_ref().unwrap().code, ErrorCode::NetworkFailure);
    }
}
