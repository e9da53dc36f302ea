use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use sentinel::coordinator::CoordinatorEvent;
use sentinel::errors::Result;
use sentinel::exec::{CancelSignal, ExecutionBackend};
use sentinel::model::{
    ExecutionMessage, ExecutionUpdate, RunRequest, TestResult, TestStatus, TestSuite,
};

/// What the fake does with a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    /// Report one passing test per target, then `RunFinished`.
    Complete,
    /// Record the request and report nothing.
    Hold,
}

/// A fake backend that records requests instead of spawning processes.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    coordinator_tx: mpsc::Sender<CoordinatorEvent>,
    mode: FakeMode,
    dispatched: Arc<Mutex<Vec<(RunRequest, CancelSignal)>>>,
}

impl FakeBackend {
    pub fn new(coordinator_tx: mpsc::Sender<CoordinatorEvent>, mode: FakeMode) -> Self {
        Self {
            coordinator_tx,
            mode,
            dispatched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to everything dispatched so far.
    pub fn recorder(&self) -> Arc<Mutex<Vec<(RunRequest, CancelSignal)>>> {
        Arc::clone(&self.dispatched)
    }
}

pub fn passing_suite(path: impl Into<PathBuf>) -> TestSuite {
    let mut suite = TestSuite::empty(path);
    suite.results.push(TestResult {
        name: "TestValue".to_string(),
        parent: None,
        status: TestStatus::Passed,
        elapsed: Duration::from_millis(3),
        output: Vec::new(),
        error: None,
    });
    suite.elapsed = Duration::from_millis(3);
    suite
}

/// The messages a real engine would send for one passing target.
pub fn completion_messages(request: &RunRequest) -> Vec<CoordinatorEvent> {
    let mut events = Vec::new();
    for target in &request.targets {
        let target = Arc::new(target.clone());
        let suite = passing_suite(target.path.clone());
        let updates = [
            ExecutionUpdate::SuiteStarted,
            ExecutionUpdate::TestFinished(suite.results[0].clone()),
            ExecutionUpdate::SuiteFinished(Ok(suite)),
        ];
        for update in updates {
            events.push(CoordinatorEvent::Execution(ExecutionMessage {
                generation: request.generation,
                target: Arc::clone(&target),
                update,
            }));
        }
    }
    events.push(CoordinatorEvent::RunFinished {
        generation: request.generation,
    });
    events
}

impl ExecutionBackend for FakeBackend {
    fn dispatch(
        &mut self,
        request: RunRequest,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.coordinator_tx.clone();
        let mode = self.mode;
        let dispatched = Arc::clone(&self.dispatched);

        Box::pin(async move {
            let events = completion_messages(&request);
            dispatched
                .lock()
                .expect("recorder lock poisoned")
                .push((request, cancel));

            if mode == FakeMode::Complete {
                tokio::spawn(async move {
                    for event in events {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                });
            }
            Ok(())
        })
    }
}
