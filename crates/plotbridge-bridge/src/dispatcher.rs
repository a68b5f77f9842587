use std::io::Write;

use plotbridge_frame::FrameWriter;
use tracing::{debug, info, warn};

use crate::accumulator::{Bindings, CommandCycle};
use crate::error::Result;

/// Failure reported by an evaluator. Carries a human-readable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Executes command text against the persistent binding set.
///
/// The evaluator may read, add, replace or remove bindings.
pub trait Evaluator {
    fn evaluate(&mut self, command: &str, bindings: &mut Bindings)
        -> std::result::Result<(), EvalError>;
}

/// Draws a failure indicator when evaluation fails.
pub trait Renderer {
    fn show_error_placeholder(&mut self);
}

/// Where return values go.
pub trait ReturnChannel {
    /// Send one `(symbol, native-order bytes)` pair.
    fn send_return(&mut self, symbol: &str, value: &[u8]) -> Result<()>;
}

/// Two consecutive frames: the symbol name, then the raw value.
impl<W: Write> ReturnChannel for FrameWriter<W> {
    fn send_return(&mut self, symbol: &str, value: &[u8]) -> Result<()> {
        self.send(symbol.as_bytes())?;
        self.send(value)?;
        Ok(())
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The cycle had no command text; nothing ran.
    NoCommand,
    /// Evaluation succeeded; `returned` values were handed to the return
    /// channel.
    Evaluated { returned: usize },
    /// Evaluation failed and the renderer was told.
    EvaluationFailed(EvalError),
}

/// Runs finished cycles against an evaluator.
///
/// Owns the persistent binding set: values bound in one cycle stay visible
/// to later cycles until overwritten.
pub struct Dispatcher<E, R> {
    evaluator: E,
    renderer: R,
    bindings: Bindings,
    dispatched: u64,
}

impl<E: Evaluator, R: Renderer> Dispatcher<E, R> {
    pub fn new(evaluator: E, renderer: R) -> Self {
        Self {
            evaluator,
            renderer,
            bindings: Bindings::new(),
            dispatched: 0,
        }
    }

    pub fn dispatch(
        &mut self,
        cycle: CommandCycle,
        returns: &mut dyn ReturnChannel,
    ) -> DispatchResult {
        let CommandCycle {
            command_text,
            bindings,
            pending_returns,
        } = cycle;

        self.bindings.extend(bindings);

        let Some(command) = command_text else {
            debug!("finalize without command text");
            return DispatchResult::NoCommand;
        };

        self.dispatched += 1;
        let cycle_id = self.dispatched;
        debug!(cycle_id, command = %command, bindings = self.bindings.len(), "evaluating");

        if let Err(err) = self.evaluator.evaluate(&command, &mut self.bindings) {
            warn!(cycle_id, error = %err, "evaluation failed");
            self.renderer.show_error_placeholder();
            return DispatchResult::EvaluationFailed(err);
        }

        let mut returned = 0usize;
        for symbol in &pending_returns {
            let Some(value) = self.bindings.get(symbol) else {
                warn!(cycle_id, symbol = %symbol, "return symbol no longer bound");
                continue;
            };
            match returns.send_return(symbol, &value.to_ne_bytes()) {
                Ok(()) => {
                    debug!(cycle_id, symbol = %symbol, value = %value, "returned");
                    returned += 1;
                }
                Err(err) => warn!(cycle_id, symbol = %symbol, error = %err, "return send failed"),
            }
        }

        info!(cycle_id, returned, "cycle dispatched");
        DispatchResult::Evaluated { returned }
    }

    /// The persistent binding set.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Number of cycles that reached the evaluator.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use plotbridge_frame::decode_envelope;
    use plotbridge_protocol::{Buffer, Scalar};

    use super::*;
    use crate::error::BridgeError;

    #[derive(Default)]
    struct Recording {
        calls: Vec<(String, Vec<String>)>,
        fail_with: Option<String>,
    }

    impl Evaluator for Recording {
        fn evaluate(
            &mut self,
            command: &str,
            bindings: &mut Bindings,
        ) -> std::result::Result<(), EvalError> {
            self.calls
                .push((command.to_string(), bindings.keys().cloned().collect()));
            match &self.fail_with {
                Some(msg) => Err(EvalError::new(msg.clone())),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct Placeholders(usize);

    impl Renderer for Placeholders {
        fn show_error_placeholder(&mut self) {
            self.0 += 1;
        }
    }

    #[derive(Default)]
    struct Sent(Vec<(String, Vec<u8>)>);

    impl ReturnChannel for Sent {
        fn send_return(&mut self, symbol: &str, value: &[u8]) -> Result<()> {
            self.0.push((symbol.to_string(), value.to_vec()));
            Ok(())
        }
    }

    struct Broken;

    impl ReturnChannel for Broken {
        fn send_return(&mut self, _symbol: &str, _value: &[u8]) -> Result<()> {
            Err(BridgeError::Disconnected("gone".into()))
        }
    }

    fn cycle(command: Option<&str>, bound: &[(&str, i32)], returns: &[&str]) -> CommandCycle {
        CommandCycle {
            command_text: command.map(str::to_string),
            bindings: bound
                .iter()
                .map(|(k, v)| (k.to_string(), Buffer::Scalar(Scalar::I32(*v))))
                .collect(),
            pending_returns: returns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn missing_command_is_a_no_op() {
        let mut dispatcher = Dispatcher::new(Recording::default(), Placeholders::default());
        let mut sent = Sent::default();
        let result = dispatcher.dispatch(cycle(None, &[], &["y"]), &mut sent);
        assert_eq!(result, DispatchResult::NoCommand);
        assert!(dispatcher.evaluator().calls.is_empty());
        assert!(sent.0.is_empty());
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[test]
    fn bindings_persist_across_cycles() {
        let mut dispatcher = Dispatcher::new(Recording::default(), Placeholders::default());
        let mut sent = Sent::default();

        dispatcher.dispatch(cycle(Some("a = 1"), &[("x", 1)], &[]), &mut sent);
        dispatcher.dispatch(cycle(Some("plot(x, z)"), &[("z", 2)], &[]), &mut sent);

        let calls = &dispatcher.evaluator().calls;
        assert_eq!(calls[1].0, "plot(x, z)");
        assert_eq!(calls[1].1, vec!["x", "z"]);
    }

    #[test]
    fn failure_renders_placeholder_once_and_sends_nothing() {
        let evaluator = Recording {
            fail_with: Some("NameError: q".into()),
            ..Recording::default()
        };
        let mut dispatcher = Dispatcher::new(evaluator, Placeholders::default());
        let mut sent = Sent::default();

        let result = dispatcher.dispatch(cycle(Some("q + 1"), &[("y", 0)], &["y"]), &mut sent);
        assert_eq!(
            result,
            DispatchResult::EvaluationFailed(EvalError::new("NameError: q"))
        );
        assert_eq!(dispatcher.renderer().0, 1);
        assert!(sent.0.is_empty());
    }

    #[test]
    fn returns_follow_declaration_order() {
        let mut dispatcher = Dispatcher::new(Recording::default(), Placeholders::default());
        let mut sent = Sent::default();

        let result = dispatcher.dispatch(
            cycle(Some("noop"), &[("a", 1), ("b", 2)], &["b", "a"]),
            &mut sent,
        );
        assert_eq!(result, DispatchResult::Evaluated { returned: 2 });
        assert_eq!(
            sent.0,
            vec![
                ("b".to_string(), 2i32.to_ne_bytes().to_vec()),
                ("a".to_string(), 1i32.to_ne_bytes().to_vec()),
            ]
        );
    }

    #[test]
    fn unbound_return_symbol_is_skipped() {
        struct Remover;
        impl Evaluator for Remover {
            fn evaluate(
                &mut self,
                _command: &str,
                bindings: &mut Bindings,
            ) -> std::result::Result<(), EvalError> {
                bindings.remove("y");
                Ok(())
            }
        }

        let mut dispatcher = Dispatcher::new(Remover, Placeholders::default());
        let mut sent = Sent::default();
        let result = dispatcher.dispatch(cycle(Some("del y"), &[("y", 0)], &["y"]), &mut sent);
        assert_eq!(result, DispatchResult::Evaluated { returned: 0 });
    }

    #[test]
    fn return_send_failure_is_not_fatal() {
        let mut dispatcher = Dispatcher::new(Recording::default(), Placeholders::default());
        let result = dispatcher.dispatch(cycle(Some("y"), &[("y", 3)], &["y"]), &mut Broken);
        assert_eq!(result, DispatchResult::Evaluated { returned: 0 });
    }

    #[test]
    fn frame_writer_sends_name_then_value() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send_return("y", &10i32.to_ne_bytes()).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let name = decode_envelope(&mut wire, usize::MAX).unwrap().unwrap();
        let value = decode_envelope(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(name.payload(), b"y");
        assert_eq!(value.payload(), 10i32.to_ne_bytes());
    }
}
