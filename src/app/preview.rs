//! Debounced live preview of image generation
//!
//! Each request takes a new generation number. A request only reaches the
//! service if no newer one arrived during the debounce delay, and its result
//! is discarded if a newer one started while it was in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{classify_ai_error, ErrorKind};
use crate::ports::{AiService, GeneratedImage};

pub struct PreviewChannel {
    ai: Arc<dyn AiService>,
    generation: AtomicU64,
    debounce: Duration,
}

impl PreviewChannel {
    pub fn new(ai: Arc<dyn AiService>, debounce: Duration) -> Self {
        PreviewChannel {
            ai,
            generation: AtomicU64::new(0),
            debounce,
        }
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    /// Returns `Ok(None)` when superseded by a newer request
    pub async fn request(&self, prompt: &str) -> Result<Option<GeneratedImage>, ErrorKind> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.debounce).await;
        if !self.is_current(token) {
            return Ok(None);
        }

        let result = self.ai.generate_image(prompt).await;
        if !self.is_current(token) {
            tracing::debug!(token, "Discarding stale preview");
            return Ok(None);
        }
        result.map(Some).map_err(|e| classify_ai_error(&e))
    }

    /// Invalidate whatever is in flight
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl crate::app::Coordinator {
    /// Preview channel backed by this coordinator's AI service
    pub fn preview_channel(&self) -> PreviewChannel {
        PreviewChannel::new(
            self.inner.services.ai.clone(),
            crate::constants::PREVIEW_DEBOUNCE,
        )
    }
}
