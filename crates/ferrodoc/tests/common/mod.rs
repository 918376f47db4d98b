#![allow(dead_code)]

use core::time::Duration;
use ferrodoc::{
    Database, MessageStream, OutboundStream, RpcClient, Settings,
    ferrodoc_core::{Error, Result, types::{Method, RESOURCE_PREFIX_HEADER}},
};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::time::Instant;
use tonic::{Request, Status};

pub const PROJECT: &str = "demo";
pub const DETECTED_PROJECT: &str = "detected-project";

/// One call observed by a [`ScriptedClient`].
#[derive(Clone, Debug)]
pub struct Call {
    pub client: usize,
    pub method: Method,
    /// Request body; the first written message for bidirectional calls.
    pub payload: Value,
    pub resource_prefix: Option<String>,
    pub at: Instant,
}

/// Scripted result of opening a streaming call.
pub enum StreamScript {
    /// The call opens and yields these items, then ends.
    Items(Vec<Result<Value>>),
    /// Opening the call fails.
    Fail(Error),
}

/// Shared script and call log for every handle a pool creates.
#[derive(Default)]
pub struct Script {
    unary: Mutex<HashMap<Method, VecDeque<Result<Value>>>>,
    streams: Mutex<HashMap<Method, VecDeque<StreamScript>>>,
    calls: Mutex<Vec<Call>>,
    outbound: Mutex<Vec<Value>>,
    clients: AtomicUsize,
    transactions: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_unary(&self, method: Method, outcome: Result<Value>) -> &Self {
        self.unary
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn push_stream(&self, method: Method, outcome: StreamScript) -> &Self {
        self.streams
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: Method) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    /// Every message written into bidirectional calls, in write order.
    pub fn outbound(&self) -> Vec<Value> {
        self.outbound.lock().unwrap().clone()
    }

    pub fn clients_created(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    pub fn client(self: &Arc<Self>) -> ScriptedClient {
        ScriptedClient {
            id: self.clients.fetch_add(1, Ordering::SeqCst),
            script: Arc::clone(self),
        }
    }

    fn record<T>(&self, client: usize, method: Method, request: &Request<T>, payload: Value) {
        let resource_prefix = request
            .metadata()
            .get(RESOURCE_PREFIX_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.calls.lock().unwrap().push(Call {
            client,
            method,
            payload,
            resource_prefix,
            at: Instant::now(),
        });
    }

    fn next_unary(&self, method: Method) -> Result<Value> {
        let scripted = self
            .unary
            .lock()
            .unwrap()
            .get_mut(&method)
            .and_then(VecDeque::pop_front);
        if let Some(outcome) = scripted {
            return outcome;
        }
        match method {
            Method::BeginTransaction => {
                let n = self.transactions.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({ "transaction": format!("tx{n}") }))
            }
            Method::Commit => Ok(json!({
                "commitTime": "2024-01-01T00:00:00Z",
                "writeResults": [],
            })),
            Method::Rollback => Ok(json!({})),
            other => Err(Status::unimplemented(format!("no script for {other}")).into()),
        }
    }

    fn next_stream(&self, method: Method) -> Result<MessageStream> {
        let scripted = self
            .streams
            .lock()
            .unwrap()
            .get_mut(&method)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(StreamScript::Items(items)) => Ok(stream::iter(items).boxed()),
            Some(StreamScript::Fail(err)) => Err(err),
            None => Ok(stream::empty().boxed()),
        }
    }
}

pub struct ScriptedClient {
    id: usize,
    script: Arc<Script>,
}

impl RpcClient for ScriptedClient {
    async fn unary(&self, method: Method, request: Request<Value>) -> Result<Value> {
        self.script
            .record(self.id, method, &request, request.get_ref().clone());
        self.script.next_unary(method)
    }

    async fn server_streaming(&self, method: Method, request: Request<Value>) -> Result<MessageStream> {
        self.script
            .record(self.id, method, &request, request.get_ref().clone());
        self.script.next_stream(method)
    }

    async fn streaming(&self, method: Method, request: Request<OutboundStream>) -> Result<MessageStream> {
        let resource_prefix = request
            .metadata()
            .get(RESOURCE_PREFIX_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut outbound = request.into_inner();
        let first = outbound.next().await.unwrap_or(Value::Null);
        self.script.calls.lock().unwrap().push(Call {
            client: self.id,
            method,
            payload: first.clone(),
            resource_prefix,
            at: Instant::now(),
        });
        self.script.outbound.lock().unwrap().push(first);

        let script = Arc::clone(&self.script);
        tokio::spawn(async move {
            while let Some(message) = outbound.next().await {
                script.outbound.lock().unwrap().push(message);
            }
        });
        self.script.next_stream(method)
    }

    async fn detect_project_id(&self) -> Result<String> {
        Ok(DETECTED_PROJECT.to_string())
    }
}

pub fn settings() -> Settings {
    Settings::default()
        .with_project_id(PROJECT)
        .with_retry_delay(Duration::from_millis(100))
}

pub fn database(script: &Arc<Script>, settings: Settings) -> Database<ScriptedClient> {
    let script = Arc::clone(script);
    Database::with_factory(settings, move || script.client()).unwrap()
}

pub fn unavailable(message: &str) -> Error {
    Status::unavailable(message.to_string()).into()
}

pub fn document_name(path: &str) -> String {
    format!("projects/{PROJECT}/databases/(default)/documents/{path}")
}

pub fn found(path: &str, fields: Value) -> Result<Value> {
    Ok(json!({
        "found": {
            "name": document_name(path),
            "fields": fields,
            "updateTime": "2024-01-01T00:00:00Z",
        },
        "readTime": "2024-01-02T00:00:00Z",
    }))
}

pub fn missing(path: &str) -> Result<Value> {
    Ok(json!({
        "missing": document_name(path),
        "readTime": "2024-01-02T00:00:00Z",
    }))
}
