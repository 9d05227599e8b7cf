//! Evaluation of compiled submissions.
//!
//! Compilation happens client-side; the agent receives an already-compiled
//! unit and an evaluator attached by the host runs it.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{ErrorValue, Value};
use crate::representation::{ExceptionNode, RepresentedObject, RepresentedType};

/// A unit of code ready to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledSubmission {
    pub code_cell_id: String,
    pub unit: String,
}

/// Which standard stream a captured segment was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Output written by a submission while it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub code_cell_id: String,
    pub stream: OutputStream,
    pub text: String,
}

/// Receives output segments as an evaluation produces them.
pub trait OutputSink {
    fn write(&self, stream: OutputStream, text: &str);
}

/// Runs compiled submissions. Always called on the main context.
///
/// Anything the submission prints goes to `output` as it happens.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        submission: &CompiledSubmission,
        output: &dyn OutputSink,
    ) -> Result<Value, ErrorValue>;
}

/// Outcome of one evaluation, sent as a response and pushed to listeners.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub code_cell_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type: Option<RepresentedType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RepresentedObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionNode>,
    pub duration_ms: u64,
}

/// Evaluator that resolves each unit as the name of a global value.
///
/// `print <text>` and `eprint <text>` write a line to stdout or stderr and
/// evaluate to null.
#[derive(Default)]
pub struct NamedValueEvaluator {
    globals: RwLock<HashMap<String, Value>>,
}

impl NamedValueEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.write().insert(name.into(), value.into());
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.define(name, value);
        self
    }
}

impl Evaluator for NamedValueEvaluator {
    fn evaluate(
        &self,
        submission: &CompiledSubmission,
        output: &dyn OutputSink,
    ) -> Result<Value, ErrorValue> {
        let unit = submission.unit.trim();
        let printed = [("print ", OutputStream::Stdout), ("eprint ", OutputStream::Stderr)]
            .into_iter()
            .find_map(|(prefix, stream)| unit.strip_prefix(prefix).map(|text| (stream, text)));
        if let Some((stream, text)) = printed {
            output.write(stream, &format!("{text}\n"));
            return Ok(Value::Null);
        }

        self.globals.read().get(unit).cloned().ok_or_else(|| {
            ErrorValue::new("NameError", format!("name '{unit}' is not defined"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(OutputStream, String)>>);

    impl OutputSink for Recorded {
        fn write(&self, stream: OutputStream, text: &str) {
            self.0.lock().push((stream, text.to_string()));
        }
    }

    fn submit(unit: &str) -> CompiledSubmission {
        CompiledSubmission {
            code_cell_id: "cell".into(),
            unit: unit.into(),
        }
    }

    #[test]
    fn resolves_defined_names() {
        let evaluator = NamedValueEvaluator::new().with("answer", 42);
        let output = Recorded::default();
        assert!(matches!(
            evaluator.evaluate(&submit(" answer "), &output),
            Ok(Value::I32(42))
        ));
        assert!(output.0.lock().is_empty());
    }

    #[test]
    fn undefined_names_raise() {
        let err = NamedValueEvaluator::new()
            .evaluate(&submit("missing"), &Recorded::default())
            .expect_err("undefined");
        assert_eq!(err.type_name, "NameError");
    }

    #[test]
    fn print_writes_to_the_sink() {
        let evaluator = NamedValueEvaluator::new();
        let output = Recorded::default();

        assert!(matches!(evaluator.evaluate(&submit("print hello"), &output), Ok(Value::Null)));
        assert!(matches!(evaluator.evaluate(&submit("eprint oops"), &output), Ok(Value::Null)));

        assert_eq!(
            *output.0.lock(),
            vec![
                (OutputStream::Stdout, "hello\n".to_string()),
                (OutputStream::Stderr, "oops\n".to_string()),
            ]
        );
    }
}
