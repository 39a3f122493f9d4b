//! Transform helpers shared by the integration tests

use stagepipe_rs::{transform, Transform, Value};

pub fn square() -> Transform<Value> {
    transform(|x: Value| x * x)
}

pub fn increment() -> Transform<Value> {
    transform(|x: Value| x + 1)
}

/// Arithmetic step that can be applied both inside and outside a pipeline
#[derive(Debug, Clone, Copy)]
pub enum Op {
    Add(Value),
    Mul(Value),
    Negate,
    Identity,
}

impl Op {
    pub fn apply(self, x: Value) -> Value {
        match self {
            Op::Add(k) => x.wrapping_add(k),
            Op::Mul(k) => x.wrapping_mul(k),
            Op::Negate => x.wrapping_neg(),
            Op::Identity => x,
        }
    }

    pub fn into_transform(self) -> Transform<Value> {
        transform(move |x: Value| self.apply(x))
    }
}

/// Apply `ops` to each value in order, without threads
pub fn apply_all(values: &[Value], ops: &[Op]) -> Vec<Value> {
    values
        .iter()
        .map(|&v| ops.iter().fold(v, |acc, op| op.apply(acc)))
        .collect()
}
