use plotbridge_bridge::{Bindings, EvalError, Evaluator, Renderer};
use tracing::{info, warn};

/// Logs each command with a summary of the bindings it would see. Never
/// fails and never changes a binding.
#[derive(Debug, Default)]
pub struct TraceEvaluator {
    evaluated: u64,
}

impl Evaluator for TraceEvaluator {
    fn evaluate(&mut self, command: &str, bindings: &mut Bindings) -> Result<(), EvalError> {
        self.evaluated += 1;
        info!(
            cycle = self.evaluated,
            command,
            bindings = %summarize(bindings),
            "command"
        );
        Ok(())
    }
}

/// Stands in for a plotting surface: a failed evaluation becomes a `warn`
/// event.
#[derive(Debug, Default)]
pub struct LogRenderer {
    placeholders: u64,
}

impl Renderer for LogRenderer {
    fn show_error_placeholder(&mut self) {
        self.placeholders += 1;
        warn!(placeholders = self.placeholders, "evaluation failed; showing error placeholder");
    }
}

/// `x=int32[3] y=float64 scalar`
fn summarize(bindings: &Bindings) -> String {
    bindings
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use plotbridge_protocol::{Buffer, Scalar};

    use super::*;

    #[test]
    fn trace_evaluator_leaves_bindings_alone() {
        let mut bindings = Bindings::new();
        bindings.insert("y".into(), Buffer::Scalar(Scalar::I32(0)));
        let mut evaluator = TraceEvaluator::default();

        evaluator.evaluate("y = 1", &mut bindings).unwrap();
        assert_eq!(evaluator.evaluated, 1);
        assert_eq!(bindings["y"], Buffer::Scalar(Scalar::I32(0)));
    }

    #[test]
    fn summary_lists_bindings_in_order() {
        let mut bindings = Bindings::new();
        bindings.insert("b".into(), Buffer::Text("hi".into()));
        bindings.insert("a".into(), Buffer::Scalar(Scalar::F64(1.0)));
        assert_eq!(summarize(&bindings), "a=float64 scalar b=text(2)");
    }

    #[test]
    fn renderer_counts_placeholders() {
        let mut renderer = LogRenderer::default();
        renderer.show_error_placeholder();
        renderer.show_error_placeholder();
        assert_eq!(renderer.placeholders, 2);
    }
}
