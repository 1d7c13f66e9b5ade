use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ExtractionService, ServiceError, ServiceResult};

/// Replays canned responses in order; once exhausted every call fails.
pub(crate) struct ScriptedService {
    responses: Mutex<VecDeque<ServiceResult<String>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedService {
    pub(crate) fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub(crate) fn failing() -> Self {
        let service = Self::new(Vec::<String>::new());
        service
            .responses
            .lock()
            .unwrap()
            .push_back(Err(ServiceError::EmptyResponse));
        service
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for ScriptedService {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, _instruction: &str, _text: &str) -> ServiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ServiceError::EmptyResponse))
    }
}
