//! Inference glue around the two pre-trained artifacts.
//!
//! Both predictors own their artifacts through a [`LazyArtifact`], which loads
//! on first use, shares the result read-only afterwards, and retries on the
//! next call when a load fails.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

pub mod diagnosis;
pub mod watering;

pub use diagnosis::DiagnosisPredictor;
pub use watering::WateringPredictor;

// ---

/// Errors raised by the predictors.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// An artifact is missing, corrupt, or failed to load.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The plant type is not one of the encoder's categories.
    #[error("unknown plant type: {0}")]
    UnknownCategory(String),

    /// The uploaded bytes are not a decodable image.
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The model ran but produced something unusable.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Observable load state of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    // ---
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadStatus::Unloaded => "unloaded",
            LoadStatus::Loading => "loading",
            LoadStatus::Ready => "ready",
            LoadStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

enum LoadState<T> {
    Unloaded,
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

type Loader<T> = Arc<dyn Fn() -> Result<T, InferenceError> + Send + Sync>;

/// Load-once holder for a model artifact.
///
/// `state` is only held for short, non-blocking sections; `init` serializes
/// loaders so concurrent first callers wait for one load instead of racing.
pub struct LazyArtifact<T> {
    // ---
    name: &'static str,
    loader: Loader<T>,
    state: Mutex<LoadState<T>>,
    init: tokio::sync::Mutex<()>,
}

impl<T> LazyArtifact<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Result<T, InferenceError> + Send + Sync + 'static,
    {
        // ---
        LazyArtifact {
            name,
            loader: Arc::new(loader),
            state: Mutex::new(LoadState::Unloaded),
            init: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> LoadStatus {
        // ---
        match &*self.lock_state() {
            LoadState::Unloaded => LoadStatus::Unloaded,
            LoadState::Loading => LoadStatus::Loading,
            LoadState::Ready(_) => LoadStatus::Ready,
            LoadState::Failed(_) => LoadStatus::Failed,
        }
    }

    /// Return the loaded artifact, loading it first if needed.
    ///
    /// The loader runs on the blocking pool. A failure is recorded as
    /// `Failed` and the next call tries again.
    pub async fn get(&self) -> Result<Arc<T>, InferenceError> {
        // ---
        if let Some(ready) = self.ready() {
            return Ok(ready);
        }

        let _guard = self.init.lock().await;

        // Another caller may have finished the load while we waited.
        if let Some(ready) = self.ready() {
            return Ok(ready);
        }

        *self.lock_state() = LoadState::Loading;
        info!("Loading {}", self.name);

        let loader = Arc::clone(&self.loader);
        let outcome = match tokio::task::spawn_blocking(move || loader()).await {
            Ok(result) => result,
            Err(e) => Err(InferenceError::ModelUnavailable(format!(
                "loader task failed: {e}"
            ))),
        };

        match outcome {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                *self.lock_state() = LoadState::Ready(Arc::clone(&artifact));
                info!("Loaded {}", self.name);
                Ok(artifact)
            }
            Err(e) => {
                error!("Failed loading {}: {}", self.name, e);
                *self.lock_state() = LoadState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Message of the most recent failed load, if the last attempt failed.
    pub fn last_error(&self) -> Option<String> {
        // ---
        match &*self.lock_state() {
            LoadState::Failed(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    fn ready(&self) -> Option<Arc<T>> {
        match &*self.lock_state() {
            LoadState::Ready(artifact) => Some(Arc::clone(artifact)),
            _ => None,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LoadState<T>> {
        // A poisoned lock still holds a valid state value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Map any artifact loading failure into [`InferenceError::ModelUnavailable`].
pub(crate) fn unavailable(what: &str, err: impl fmt::Display) -> InferenceError {
    InferenceError::ModelUnavailable(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_loads_once_and_reuses() {
        // ---
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let artifact = LazyArtifact::new("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42u32)
        });

        assert_eq!(artifact.status(), LoadStatus::Unloaded);
        assert_eq!(*artifact.get().await.unwrap(), 42);
        assert_eq!(*artifact.get().await.unwrap(), 42);
        assert_eq!(artifact.status(), LoadStatus::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        // ---
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let artifact = LazyArtifact::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(InferenceError::ModelUnavailable("disk hiccup".to_string()))
            } else {
                Ok("model")
            }
        });

        assert!(artifact.get().await.is_err());
        assert_eq!(artifact.status(), LoadStatus::Failed);
        assert!(artifact.last_error().unwrap().contains("disk hiccup"));

        assert_eq!(*artifact.get().await.unwrap(), "model");
        assert_eq!(artifact.status(), LoadStatus::Ready);
        assert_eq!(artifact.last_error(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_load_once() {
        // ---
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let artifact = Arc::new(LazyArtifact::new("slow", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(vec![1.0f32, 2.0])
        }));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let artifact = Arc::clone(&artifact);
            handles.push(tokio::spawn(async move { artifact.get().await.map(|v| v.len()) }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
