//! Pointer input plumbing
//!
//! A source is attached for the lifetime of a binding and detached on every
//! exit path, including drops on error paths.

use std::time::Duration;

use anyhow::Result;

use super::engine::ViewerEngine;
use super::types::PointerEvent;

/// Trait for abstracting pointer event streams to enable testing
pub trait PointerSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<PointerEvent>;
}

/// Scripted pointer source for tests and harnesses
pub struct SimulatedPointerSource {
    events: Vec<PointerEvent>,
    current_index: usize,
}

impl SimulatedPointerSource {
    #[must_use]
    pub fn new(events: Vec<PointerEvent>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }
}

impl PointerSource for SimulatedPointerSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<PointerEvent> {
        match self.events.get(self.current_index) {
            Some(event) => {
                self.current_index += 1;
                Ok(*event)
            }
            None => anyhow::bail!("pointer event stream exhausted"),
        }
    }
}

/// A pointer source bound to a viewer surface.
///
/// Dropping the binding detaches the source; `detach` makes that explicit
/// when the caller wants it on a named code path.
pub struct InputBinding {
    source: Box<dyn PointerSource>,
    detached: bool,
}

impl InputBinding {
    /// Attach a source. The returned handle is the only way to pump events.
    #[must_use]
    pub fn attach(source: Box<dyn PointerSource>) -> Self {
        log::debug!("pointer source attached");
        Self {
            source,
            detached: false,
        }
    }

    /// Drain every available event into the engine
    pub fn pump(&mut self, engine: &mut ViewerEngine) -> Result<()> {
        while self.source.poll(Duration::ZERO)? {
            let event = self.source.read()?;
            engine.pointer_event(event);
        }
        Ok(())
    }

    /// Explicit detach; also runs on drop
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.detached {
            self.detached = true;
            log::debug!("pointer source detached");
        }
    }
}

impl Drop for InputBinding {
    fn drop(&mut self) {
        self.release();
    }
}
