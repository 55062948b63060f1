use super::{ExecError, ExecResult, Executor};
use crate::record::{TableSchema, Tuple, Value};
use std::cmp::Ordering;

/// Comparison operators for predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring containment on strings
    Like,
}

/// Compares one tuple field against a constant
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Value,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: Value) -> Self {
        Self { field, op, operand }
    }

    /// Evaluate against a tuple. NULL and type-incomparable fields never
    /// match.
    pub fn eval(&self, tuple: &Tuple) -> ExecResult<bool> {
        let value = tuple.get(self.field).ok_or_else(|| {
            ExecError::Invalid(format!("predicate field {} out of range", self.field))
        })?;

        if let CompareOp::Like = self.op {
            return Ok(match (value, &self.operand) {
                (Value::String(text), Value::String(pattern)) => text.contains(pattern.as_str()),
                _ => false,
            });
        }

        let Some(ordering) = value.compare(&self.operand) else {
            return Ok(false);
        };
        Ok(match self.op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Like => unreachable!(),
        })
    }
}

/// Relational select: passes through the child's tuples that satisfy the
/// predicate.
pub struct Filter<'a> {
    predicate: Predicate,
    child: Box<dyn Executor + 'a>,
}

impl<'a> Filter<'a> {
    pub fn new(predicate: Predicate, child: Box<dyn Executor + 'a>) -> Self {
        Self { predicate, child }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Executor for Filter<'_> {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        while let Some(tuple) = self.child.next()? {
            if self.predicate.eval(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn schema(&self) -> &TableSchema {
        self.child.schema()
    }
}
