//! Recording in-memory broker used by the tests.
//!
//! Models exchanges, queues with pending message counts and bindings, and
//! keeps an ordered log of every command it receives.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::connection::{BrokerSession, ConnectionFactory};
use super::error::BrokerError;
use super::types::QueueName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Declare(String),
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
    },
    Delete {
        queue: String,
        if_empty: bool,
    },
    Close,
}

#[derive(Default)]
struct State {
    exchanges: HashSet<String>,
    queues: HashMap<String, u32>,
    bindings: Vec<(String, String, String)>,
    calls: Vec<Call>,
    opened: usize,
    closed: usize,
    refuse_connections: bool,
    fail_deletes: bool,
    bind_gate: Option<Arc<Notify>>,
}

#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<State>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchange(self, exchange: &str) -> Self {
        self.lock().exchanges.insert(exchange.to_string());
        self
    }

    pub fn refuse_connections(&self) {
        self.lock().refuse_connections = true;
    }

    pub fn fail_deletes(&self) {
        self.lock().fail_deletes = true;
    }

    /// Hold every bind until the returned gate is notified.
    pub fn pause_binds(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().bind_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Pretend `count` messages were routed to `queue`.
    pub fn enqueue(&self, queue: &QueueName, count: u32) {
        *self.lock().queues.entry(queue.to_string()).or_default() += count;
    }

    pub fn has_queue(&self, queue: &QueueName) -> bool {
        self.lock().queues.contains_key(queue.as_str())
    }

    pub fn queue_count(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn is_bound(&self, queue: &QueueName, exchange: &str, routing_key: &str) -> bool {
        self.lock().bindings.iter().any(|(q, e, r)| {
            q == queue.as_str() && e == exchange && r == routing_key
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl ConnectionFactory for MockBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let mut state = self.lock();
        state.calls.push(Call::Connect);
        if state.refuse_connections {
            return Err(BrokerError::Connect(
                "ACCESS_REFUSED - Login was refused".to_string(),
            ));
        }
        state.opened += 1;
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<State>>,
}

impl MockSession {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl BrokerSession for MockSession {
    async fn declare_durable_queue(&self, queue: &QueueName) -> Result<(), BrokerError> {
        let mut state = self.lock();
        state.calls.push(Call::Declare(queue.to_string()));
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &QueueName,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let gate = self.lock().bind_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.lock();
        state.calls.push(Call::Bind {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        });
        if !state.exchanges.contains(exchange) {
            return Err(BrokerError::Bind {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
                reason: format!("NOT_FOUND - no exchange '{}'", exchange),
            });
        }
        state
            .bindings
            .push((queue.to_string(), exchange.to_string(), routing_key.to_string()));
        Ok(())
    }

    async fn delete_queue(&self, queue: &QueueName, if_empty: bool) -> Result<u32, BrokerError> {
        let mut state = self.lock();
        state.calls.push(Call::Delete {
            queue: queue.to_string(),
            if_empty,
        });
        if state.fail_deletes {
            return Err(BrokerError::Delete {
                queue: queue.to_string(),
                reason: "channel closed".to_string(),
            });
        }
        let pending = state.queues.get(queue.as_str()).copied().unwrap_or(0);
        if if_empty && pending > 0 {
            return Err(BrokerError::Delete {
                queue: queue.to_string(),
                reason: format!("PRECONDITION_FAILED - queue '{}' not empty", queue),
            });
        }
        state.queues.remove(queue.as_str());
        state.bindings.retain(|(q, _, _)| q != queue.as_str());
        Ok(pending)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.lock();
        state.calls.push(Call::Close);
        state.closed += 1;
        Ok(())
    }
}
