//! Passthrough node - forwards frames unchanged.

use crate::error::Result;
use crate::node::{Node, StepContext, StepOutcome};

/// A node that forwards frames from its input to its output unchanged.
///
/// Useful as a pipeline placeholder and for testing the scheduling
/// infrastructure. It is also the smallest possible demonstration of the
/// activation protocol: the node body only moves frames; status
/// propagation in both directions and demand forwarding are inherited
/// from the generic activation idioms.
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    /// Create a passthrough with the default name.
    pub fn new() -> Self {
        Self {
            name: "passthrough".to_string(),
        }
    }

    /// Create a passthrough with a custom name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Passthrough {
    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn process(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        match ctx.consume_frame(0) {
            Some(frame) => {
                ctx.push_frame(0, frame);
                Ok(StepOutcome::Progressed)
            }
            None => Ok(StepOutcome::NotReady),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
