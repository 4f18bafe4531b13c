use std::sync::{Arc, Mutex, MutexGuard};

use super::TextSurface;
use crate::Result;

#[derive(Debug, Default)]
struct MemoryState {
    history: Vec<String>,
    shutdowns: usize,
}

/// Surface that keeps every text it was given. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySurface {
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    pub fn last(&self) -> Option<String> {
        self.lock().history.last().cloned()
    }

    pub fn writes(&self) -> usize {
        self.lock().history.len()
    }

    pub fn shutdowns(&self) -> usize {
        self.lock().shutdowns
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TextSurface for MemorySurface {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.lock().history.push(text.to_string());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.lock().shutdowns += 1;
        Ok(())
    }
}
