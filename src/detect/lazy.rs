use std::sync::{Mutex, OnceLock};

use anyhow::{anyhow, Result};

use super::backend::ObjectDetector;

type Loader = Box<dyn Fn() -> Result<Box<dyn ObjectDetector>> + Send + Sync>;

/// Load-once holder for the object-detection model.
///
/// The loader runs on first use and its outcome is kept for the lifetime of
/// the holder. A failed load is remembered and reported on every later call;
/// it is never retried. One instance is created at startup and shared (via
/// `Arc`) with every detector that needs the model.
pub struct LazyModel {
    loader: Loader,
    slot: OnceLock<Result<Mutex<Box<dyn ObjectDetector>>, String>>,
}

impl LazyModel {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ObjectDetector>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            slot: OnceLock::new(),
        }
    }

    /// Holder around an already-built backend.
    pub fn ready<B: ObjectDetector + 'static>(backend: B) -> Self {
        let lazy = Self::new(|| Err(anyhow!("model already loaded")));
        let _ = lazy.slot.set(Ok(Mutex::new(Box::new(backend))));
        lazy
    }

    /// Holder whose every use fails with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || Err(anyhow!("{}", reason)))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    /// Borrow the model, loading it on first call.
    pub fn get(&self) -> Result<&Mutex<Box<dyn ObjectDetector>>> {
        let entry = self.slot.get_or_init(|| {
            let loaded = (self.loader)().and_then(|mut backend| {
                backend.warm_up()?;
                Ok(backend)
            });
            match loaded {
                Ok(backend) => {
                    log::info!("object detector '{}' loaded", backend.name());
                    Ok(Mutex::new(backend))
                }
                Err(err) => {
                    log::error!("object detector failed to load: {:#}", err);
                    Err(format!("{:#}", err))
                }
            }
        });
        entry
            .as_ref()
            .map_err(|reason| anyhow!("object detector unavailable: {}", reason))
    }

    /// Run `f` with exclusive access to the model.
    pub fn with_model<T>(&self, f: impl FnOnce(&mut dyn ObjectDetector) -> Result<T>) -> Result<T> {
        let model = self.get()?;
        let mut guard = model
            .lock()
            .map_err(|_| anyhow!("object detector lock poisoned"))?;
        f(guard.as_mut())
    }
}
