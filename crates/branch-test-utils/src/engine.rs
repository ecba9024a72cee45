//! Build engine that records what it was asked to run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use branch_core::build::BuildEngineError;
use branch_core::{BuildEngine, BuildRequest, BuildResult};

#[derive(Debug, Default)]
struct EngineState {
    requests: Vec<BuildRequest>,
    result: Option<BuildResult>,
    delay: Option<Duration>,
    failing: HashSet<String>,
    erroring: HashSet<String>,
}

/// Records every [`BuildRequest`] and completes it with a configurable
/// result.
///
/// Builds succeed unless configured otherwise. Cloning shares the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingBuildEngine {
    state: Arc<Mutex<EngineState>>,
}

impl RecordingBuildEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete every build with `result`.
    pub fn with_result(self, result: BuildResult) -> Self {
        self.state.lock().unwrap().result = Some(result);
        self
    }

    /// Hold every build for `delay` before completing it.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Builds of the branch with this display name complete as failures.
    pub fn fail_branch(&self, display_name: &str) {
        self.state.lock().unwrap().failing.insert(display_name.to_string());
    }

    /// Builds of the branch with this display name error out in the engine.
    pub fn error_branch(&self, display_name: &str) {
        self.state.lock().unwrap().erroring.insert(display_name.to_string());
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests for branches with this display name, oldest first.
    pub fn requests_for(&self, display_name: &str) -> Vec<BuildRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.display_name == display_name)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Display names of every requested build, in request order.
    pub fn built_names(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.display_name)
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().requests.clear();
    }
}

#[async_trait]
impl BuildEngine for RecordingBuildEngine {
    async fn execute(&self, request: BuildRequest) -> Result<BuildResult, BuildEngineError> {
        let (delay, outcome) = {
            let mut state = self.state.lock().unwrap();
            let name = request.display_name.clone();
            state.requests.push(request);
            let outcome = if state.erroring.contains(&name) {
                Err(BuildEngineError(format!("engine refused {}", name)))
            } else if state.failing.contains(&name) {
                Ok(BuildResult::Failure)
            } else {
                Ok(state.result.unwrap_or(BuildResult::Success))
            };
            (state.delay, outcome)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
