use std::collections::BTreeMap;

use plotbridge_protocol::{reconstruct, Buffer, Header, Mode, ProtocolError};
use tracing::{debug, trace};

/// Symbol → value map handed to the evaluator.
pub type Bindings = BTreeMap<String, Buffer>;

/// One command and the data declared for it, up to a `finalize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandCycle {
    pub command_text: Option<String>,
    pub bindings: Bindings,
    /// Symbols to stream back after evaluation, in declaration order.
    pub pending_returns: Vec<String>,
}

impl CommandCycle {
    pub fn is_empty(&self) -> bool {
        self.command_text.is_none() && self.bindings.is_empty() && self.pending_returns.is_empty()
    }
}

/// Holds the open command cycle.
///
/// A `Bind` header parks here until its payload frame arrives; a
/// `BindAndReturn` header binds a zeroed placeholder straight away.
#[derive(Debug, Default)]
pub struct CommandAccumulator {
    cycle: CommandCycle,
    awaiting: Option<Header>,
}

impl CommandAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command text. Last write wins; bindings are kept.
    pub fn on_command_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(previous) = self.cycle.command_text.as_deref() {
            debug!(previous, "command text replaced before finalize");
        }
        self.cycle.command_text = Some(text);
    }

    /// Handle a decoded data header.
    pub fn on_header(&mut self, header: Header) {
        match header.mode {
            Mode::BindAndReturn => {
                let placeholder = Buffer::placeholder(&header);
                debug!(symbol = %header.symbol, value = %placeholder, "return symbol declared");
                self.register_return(&header.symbol);
                self.cycle.bindings.insert(header.symbol, placeholder);
            }
            Mode::Bind => {
                trace!(symbol = %header.symbol, "awaiting payload");
                self.awaiting = Some(header);
            }
        }
    }

    /// Whether the next frame is the payload of a parked header.
    pub fn awaiting_payload(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Reconstruct the payload for the parked header and bind it.
    ///
    /// Without a parked header the frame is ignored and `Ok(false)` is
    /// returned.
    pub fn on_payload(&mut self, payload: &[u8]) -> Result<bool, ProtocolError> {
        let Some(header) = self.awaiting.take() else {
            return Ok(false);
        };
        let buffer = reconstruct(&header, payload)?;
        self.on_data(&header, buffer);
        Ok(true)
    }

    /// Bind a reconstructed value under the header's symbol, overwriting
    /// any earlier binding of that name.
    pub fn on_data(&mut self, header: &Header, buffer: Buffer) {
        debug!(symbol = %header.symbol, value = %buffer, "bound");
        if header.mode == Mode::BindAndReturn {
            self.register_return(&header.symbol);
        }
        self.cycle.bindings.insert(header.symbol.clone(), buffer);
    }

    fn register_return(&mut self, symbol: &str) {
        if !self.cycle.pending_returns.iter().any(|s| s == symbol) {
            self.cycle.pending_returns.push(symbol.to_string());
        }
    }

    /// Hand the open cycle over and start an empty one.
    pub fn take_cycle_for_dispatch(&mut self) -> CommandCycle {
        self.awaiting = None;
        std::mem::take(&mut self.cycle)
    }

    /// Discard the open cycle.
    pub fn reset(&mut self) {
        self.awaiting = None;
        self.cycle = CommandCycle::default();
    }

    pub fn cycle(&self) -> &CommandCycle {
        &self.cycle
    }
}
