//! Dedicated render thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use sceneview_core::RenderBackend;

use crate::manager::SharedManager;

/// Calls [`WindowsManager::refresh`](crate::WindowsManager::refresh) every
/// refresh period until stopped. The frame mutex is only held during the
/// refresh itself, never while sleeping.
pub struct RenderLoop<B: RenderBackend + 'static> {
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<B>>,
}

impl<B: RenderBackend + 'static> RenderLoop<B> {
    pub fn spawn(manager: SharedManager, mut backend: B) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));

        let handle = {
            let stop = stop.clone();
            let frames = frames.clone();
            std::thread::spawn(move || {
                tracing::info!("Render loop started");
                while !stop.load(Ordering::Acquire) {
                    let stats = manager.refresh(&mut backend);
                    if stats.dirty {
                        tracing::trace!("Frame rebuilt {} node(s)", stats.synced);
                    }
                    frames.fetch_add(1, Ordering::Release);
                    std::thread::sleep(manager.refresh_period());
                }
                tracing::info!("Render loop stopped");
                backend
            })
        };

        Self {
            stop,
            frames,
            handle: Some(handle),
        }
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and hand back the backend. `None` if the render
    /// thread panicked.
    pub fn stop(mut self) -> Option<B> {
        self.stop.store(true, Ordering::Release);
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl<B: RenderBackend + 'static> Drop for RenderLoop<B> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("Render thread panicked");
        }
    }
}
