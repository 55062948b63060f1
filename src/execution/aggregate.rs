use std::collections::HashMap;

use super::{ExecError, ExecResult, Executor};
use crate::record::{ColumnDef, DataType, TableSchema, Tuple, Value};

/// Aggregation operators. Integer fields support all of them; string fields
/// support COUNT only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateOp {
    fn label(&self) -> &'static str {
        match self {
            AggregateOp::Count => "COUNT",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
        }
    }
}

/// Hashable group identity; groups are integer or string valued
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Int(i32),
    Str(String),
}

impl GroupKey {
    fn from_value(value: &Value) -> ExecResult<Self> {
        match value {
            Value::Int(i) => Ok(GroupKey::Int(*i)),
            Value::String(s) => Ok(GroupKey::Str(s.clone())),
            other => Err(ExecError::Invalid(format!(
                "cannot group by value {:?}",
                other
            ))),
        }
    }

    fn into_value(self) -> Value {
        match self {
            GroupKey::Int(i) => Value::Int(i),
            GroupKey::Str(s) => Value::String(s),
        }
    }
}

/// Per-group accumulator. AVG divides at emit time with integer division.
#[derive(Debug, Clone)]
enum AggState {
    Count(i64),
    Sum(i64),
    Avg { sum: i64, count: i64 },
    Min(i32),
    Max(i32),
}

impl AggState {
    fn init(op: AggregateOp, value: i32) -> Self {
        match op {
            AggregateOp::Count => AggState::Count(1),
            AggregateOp::Sum => AggState::Sum(value as i64),
            AggregateOp::Avg => AggState::Avg {
                sum: value as i64,
                count: 1,
            },
            AggregateOp::Min => AggState::Min(value),
            AggregateOp::Max => AggState::Max(value),
        }
    }

    fn merge(&mut self, value: i32) {
        match self {
            AggState::Count(n) => *n += 1,
            AggState::Sum(sum) => *sum += value as i64,
            AggState::Avg { sum, count } => {
                *sum += value as i64;
                *count += 1;
            }
            AggState::Min(min) => *min = (*min).min(value),
            AggState::Max(max) => *max = (*max).max(value),
        }
    }

    fn emit(&self) -> Value {
        match self {
            AggState::Count(n) => Value::Int(*n as i32),
            AggState::Sum(sum) => Value::Int(*sum as i32),
            AggState::Avg { sum, count } => Value::Int((sum / count) as i32),
            AggState::Min(min) => Value::Int(*min),
            AggState::Max(max) => Value::Int(*max),
        }
    }
}

/// Grouped aggregation over one child field. Drains the child at `open`;
/// emits `(group, value)` tuples, or a single `(value)` tuple when
/// ungrouped.
pub struct Aggregate<'a> {
    child: Box<dyn Executor + 'a>,
    op: AggregateOp,
    agg_field: usize,
    group_field: Option<usize>,
    agg_is_string: bool,
    schema: TableSchema,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl<'a> Aggregate<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> ExecResult<Self> {
        let child_schema = child.schema();
        let agg_col = child_schema
            .column(agg_field)
            .ok_or_else(|| ExecError::Invalid(format!("aggregate field {} out of range", agg_field)))?;

        let agg_is_string = match agg_col.data_type {
            DataType::Int => false,
            DataType::Char(_) => {
                if op != AggregateOp::Count {
                    return Err(ExecError::Invalid(format!(
                        "{} is not supported over string fields",
                        op.label()
                    )));
                }
                true
            }
            DataType::Float => {
                return Err(ExecError::Invalid(
                    "aggregation over float fields is not supported".to_string(),
                ));
            }
        };

        let agg_name = format!("{}({})", op.label(), agg_col.name);
        let mut columns = Vec::new();
        if let Some(group) = group_field {
            let group_col = child_schema.column(group).ok_or_else(|| {
                ExecError::Invalid(format!("group field {} out of range", group))
            })?;
            columns.push(ColumnDef::new(
                group_col.name.clone(),
                group_col.data_type.clone(),
                false,
            ));
        }
        columns.push(ColumnDef::new(agg_name, DataType::Int, false));
        let schema = TableSchema::new("aggregate".to_string(), columns);

        Ok(Self {
            child,
            op,
            agg_field,
            group_field,
            agg_is_string,
            schema,
            results: Vec::new(),
            cursor: 0,
            opened: false,
        })
    }

    fn agg_input(&self, tuple: &Tuple) -> ExecResult<i32> {
        match tuple.get(self.agg_field) {
            // COUNT over strings only counts occurrences; the value is unused.
            Some(Value::String(_)) if self.agg_is_string => Ok(0),
            Some(Value::Int(i)) if !self.agg_is_string => Ok(*i),
            other => Err(ExecError::Invalid(format!(
                "unexpected aggregate input: {:?}",
                other
            ))),
        }
    }

    fn aggregate_all(&mut self) -> ExecResult<()> {
        // Keyed accumulators, plus first-seen order so output is stable.
        let mut groups: HashMap<Option<GroupKey>, AggState> = HashMap::new();
        let mut order: Vec<Option<GroupKey>> = Vec::new();

        while let Some(tuple) = self.child.next()? {
            let value = self.agg_input(&tuple)?;
            let key = match self.group_field {
                Some(field) => {
                    let group_value = tuple.get(field).ok_or_else(|| {
                        ExecError::Invalid(format!("group field {} out of range", field))
                    })?;
                    Some(GroupKey::from_value(group_value)?)
                }
                None => None,
            };

            match groups.get_mut(&key) {
                Some(state) => state.merge(value),
                None => {
                    groups.insert(key.clone(), AggState::init(self.op, value));
                    order.push(key);
                }
            }
        }

        self.results = order
            .into_iter()
            .map(|key| {
                let state = &groups[&key];
                let mut values = Vec::new();
                if let Some(group_key) = key {
                    values.push(group_key.into_value());
                }
                values.push(state.emit());
                Tuple::new(values)
            })
            .collect();
        Ok(())
    }
}

impl Executor for Aggregate<'_> {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.results.clear();
        self.aggregate_all()?;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened || self.cursor >= self.results.len() {
            return Ok(None);
        }
        let tuple = self.results[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.opened = false;
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TupleList;

    fn sales_schema() -> TableSchema {
        TableSchema::new(
            "sales".to_string(),
            vec![
                ColumnDef::new("region".to_string(), DataType::Char(8), false),
                ColumnDef::new("amount".to_string(), DataType::Int, false),
            ],
        )
    }

    fn sales() -> Vec<Tuple> {
        [("north", 10), ("south", 5), ("north", 20), ("south", 7), ("east", 3)]
            .iter()
            .map(|(region, amount)| {
                Tuple::new(vec![
                    Value::String(region.to_string()),
                    Value::Int(*amount),
                ])
            })
            .collect()
    }

    fn run(agg: &mut Aggregate) -> Vec<Tuple> {
        agg.open().unwrap();
        let mut out = Vec::new();
        while let Some(t) = agg.next().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn test_ungrouped_sum() {
        let source = TupleList::new(sales_schema(), sales());
        let mut agg = Aggregate::new(Box::new(source), 1, None, AggregateOp::Sum).unwrap();
        let out = run(&mut agg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(0), Some(&Value::Int(45)));
        assert_eq!(agg.schema().columns()[0].name, "SUM(amount)");
    }

    #[test]
    fn test_ungrouped_avg_uses_integer_division() {
        let source = TupleList::new(sales_schema(), sales());
        let mut agg = Aggregate::new(Box::new(source), 1, None, AggregateOp::Avg).unwrap();
        let out = run(&mut agg);
        assert_eq!(out[0].get(0), Some(&Value::Int(9))); // 45 / 5
    }

    #[test]
    fn test_ungrouped_min_max_count() {
        for (op, expected) in [
            (AggregateOp::Min, 3),
            (AggregateOp::Max, 20),
            (AggregateOp::Count, 5),
        ] {
            let source = TupleList::new(sales_schema(), sales());
            let mut agg = Aggregate::new(Box::new(source), 1, None, op).unwrap();
            let out = run(&mut agg);
            assert_eq!(out[0].get(0), Some(&Value::Int(expected)), "{:?}", op);
        }
    }

    #[test]
    fn test_grouped_sum_by_string() {
        let source = TupleList::new(sales_schema(), sales());
        let mut agg = Aggregate::new(Box::new(source), 1, Some(0), AggregateOp::Sum).unwrap();
        let mut out: Vec<(String, i32)> = run(&mut agg)
            .into_iter()
            .map(|t| match (t.get(0), t.get(1)) {
                (Some(Value::String(g)), Some(Value::Int(v))) => (g.clone(), *v),
                other => panic!("unexpected row: {:?}", other),
            })
            .collect();
        out.sort();
        assert_eq!(
            out,
            vec![
                ("east".to_string(), 3),
                ("north".to_string(), 30),
                ("south".to_string(), 12)
            ]
        );
        assert_eq!(agg.schema().column_count(), 2);
    }

    #[test]
    fn test_count_over_string_field() {
        let source = TupleList::new(sales_schema(), sales());
        let mut agg = Aggregate::new(Box::new(source), 0, None, AggregateOp::Count).unwrap();
        let out = run(&mut agg);
        assert_eq!(out[0].get(0), Some(&Value::Int(5)));
    }

    #[test]
    fn test_non_count_over_string_field_rejected() {
        let source = TupleList::new(sales_schema(), sales());
        let result = Aggregate::new(Box::new(source), 0, None, AggregateOp::Sum);
        assert!(matches!(result, Err(ExecError::Invalid(_))));
    }

    #[test]
    fn test_grouped_count_preserves_first_seen_order() {
        let source = TupleList::new(sales_schema(), sales());
        let mut agg = Aggregate::new(Box::new(source), 1, Some(0), AggregateOp::Count).unwrap();
        let out = run(&mut agg);
        let groups: Vec<&Value> = out.iter().map(|t| t.get(0).unwrap()).collect();
        assert_eq!(
            groups,
            vec![
                &Value::String("north".to_string()),
                &Value::String("south".to_string()),
                &Value::String("east".to_string())
            ]
        );
    }

    #[test]
    fn test_rewind_replays_results() {
        let source = TupleList::new(sales_schema(), sales());
        let mut agg = Aggregate::new(Box::new(source), 1, Some(0), AggregateOp::Sum).unwrap();
        assert_eq!(run(&mut agg).len(), 3);
        agg.rewind().unwrap();
        let mut count = 0;
        while agg.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
