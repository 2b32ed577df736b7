// In-process stand-in for the InfluxDB query endpoint
#![allow(dead_code)]

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// One request as the server saw it
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Path and query string, e.g. `/api/v2/query?org=lab`
    pub target: String,
    pub authorization: Option<String>,
    /// Flux text from the JSON body
    pub flux: String,
}

/// Answers each query with the first route whose key occurs in the Flux text.
/// Unmatched queries get a 400.
pub struct FakeInflux {
    pub url: String,
    requests: Arc<Mutex<Vec<QueryRequest>>>,
}

impl FakeInflux {
    pub fn start(routes: Vec<(&'static str, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = serve(stream, &routes, &seen);
            }
        });

        Self { url, requests }
    }

    /// A status other than 200 for every query
    pub fn failing(status: u16, body: &str) -> Self {
        Self::start(vec![("", format!("!{} {}", status, body))])
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }
}

fn serve(
    stream: TcpStream,
    routes: &[(&'static str, String)],
    seen: &Mutex<Vec<QueryRequest>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();

    let mut content_length = 0;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;
    let flux = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["query"].as_str().map(str::to_string))
        .unwrap_or_default();

    let reply = routes
        .iter()
        .find(|(key, _)| flux.contains(key))
        .map(|(_, reply)| reply.clone());
    seen.lock().push(QueryRequest {
        target,
        authorization,
        flux,
    });

    // Replies starting with '!' carry their own status
    let (status, content) = match reply {
        Some(reply) => match reply.strip_prefix('!') {
            Some(rest) => {
                let (code, text) = rest.split_once(' ').unwrap_or((rest, ""));
                (format!("{} Error", code), text.to_string())
            }
            None => ("200 OK".to_string(), reply),
        },
        None => (
            "400 Bad Request".to_string(),
            r#"{"code":"invalid","message":"unexpected query"}"#.to_string(),
        ),
    };

    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {}\r\nContent-Type: text/csv; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content.len(),
        content
    )?;
    stream.flush()
}

/// `_value` table as returned by the schema functions
pub fn value_table(values: &[&str]) -> String {
    let mut body = String::from(",result,table,_value\r\n");
    for value in values {
        body.push_str(&format!(",_result,0,{}\r\n", value));
    }
    body
}
