//! A scripted in-memory [`Connector`] for tests.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    Error, Result,
    connection::{Connection, Connector, ResultSet},
};

#[derive(Debug)]
enum Scripted {
    Rows(ResultSet),
    Fail(String),
    Panic(String),
}

#[derive(Debug, Default)]
struct State {
    refuse: Option<String>,
    fail_close: bool,
    script: VecDeque<Scripted>,
    statements: Vec<String>,
    connects: usize,
    closes: usize,
}

/// Answers statements from a script and records what it was asked to do
///
/// Statements without a scripted answer succeed with an empty result set.
/// Clones share the same script and history.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<State>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `connect` with `reason`
    pub fn refuse_connections(self, reason: impl Into<String>) -> Self {
        self.state.lock().refuse = Some(reason.into());
        self
    }

    /// Fail every connection `close`
    pub fn fail_close(self) -> Self {
        self.state.lock().fail_close = true;
        self
    }

    pub fn push_rows(&self, result: ResultSet) {
        self.state.lock().script.push_back(Scripted::Rows(result));
    }

    /// The next statement fails as if the warehouse rejected it
    pub fn push_error(&self, message: impl Into<String>) {
        self.state
            .lock()
            .script
            .push_back(Scripted::Fail(message.into()));
    }

    /// The next statement panics mid-execution
    pub fn push_panic(&self, message: impl Into<String>) {
        self.state
            .lock()
            .script
            .push_back(Scripted::Panic(message.into()));
    }

    /// Every statement executed so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.refuse {
            return Err(Error::Unavailable(reason.clone()));
        }
        state.connects += 1;
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
struct MockConnection {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, statement: &str) -> Result<ResultSet> {
        let next = {
            let mut state = self.state.lock();
            state.statements.push(statement.to_string());
            state.script.pop_front()
        };
        match next {
            None => Ok(ResultSet::default()),
            Some(Scripted::Rows(result)) => Ok(result),
            Some(Scripted::Fail(message)) => Err(Error::Statement {
                state: "ERROR_STATE".to_string(),
                message,
            }),
            Some(Scripted::Panic(message)) => panic!("{message}"),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock();
        state.closes += 1;
        if state.fail_close {
            return Err(Error::Unavailable("connection reset on close".to_string()));
        }
        Ok(())
    }
}
