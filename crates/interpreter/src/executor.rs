//! Executors: the iteration engines behind `iterate by="RULE"` and
//! `reduce by="RULE"`.
//!
//! A rule names an executor followed by an optional parameter clause,
//! e.g. `RANGE: FROM 0 TO 10 ADVANCE 2`. The built-ins are the linear
//! executor (members of a container, in order) and `RANGE`. Iteration
//! exhaustion is the `NotExists` protocol: `it_next` returning false.

use std::rc::Rc;

use hashbrown::HashMap;
use purc_core::error::{CoreError, CoreResult};
use purc_variant::Variant;

/// A live iteration produced by an executor.
pub trait ExecutorIter {
    /// The value at the current position.
    fn it_value(&self) -> Variant;

    /// Advances; false when exhausted.
    fn it_next(&mut self) -> bool;
}

/// An iteration/reduction engine.
pub trait Executor {
    /// The executor's rule name, uppercase.
    fn name(&self) -> &'static str;

    /// Starts an iteration over `on`.
    fn iterate(
        &self,
        on: &Variant,
        with: &Variant,
        param: &str,
    ) -> CoreResult<Box<dyn ExecutorIter>>;

    /// Reduces `on` to a single value. The default folds the iteration
    /// into `{count, sum, avg, max, min}` statistics over the numeric
    /// members.
    fn reduce(&self, on: &Variant, with: &Variant, param: &str) -> CoreResult<Variant> {
        let mut iter = self.iterate(on, with, param)?;

        let mut count: u64 = 0;
        let mut sum = 0.0f64;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        loop {
            let value = iter.it_value();
            let n = value.numberize();
            count += 1;
            sum += n;
            max = max.max(n);
            min = min.min(n);
            if !iter.it_next() {
                break;
            }
        }

        let result = Variant::object();
        result.object_set("count", Variant::ulongint(count))?;
        result.object_set("sum", Variant::number(sum))?;
        result.object_set(
            "avg",
            Variant::number(if count == 0 { 0.0 } else { sum / count as f64 }),
        )?;
        result.object_set("max", Variant::number(max))?;
        result.object_set("min", Variant::number(min))?;
        Ok(result)
    }
}

/// Iterates the members of a linear container (or an object's values) by
/// index. The size is re-read each step, so a shrinking container ends
/// the loop instead of faulting.
struct LinearIter {
    source: Variant,
    index: usize,
}

impl LinearIter {
    fn size(&self) -> usize {
        self.source
            .linear_size()
            .or_else(|| self.source.object_size().ok())
            .unwrap_or(0)
    }

    fn at(&self, index: usize) -> Option<Variant> {
        self.source
            .linear_get(index)
            .or_else(|| {
                self.source
                    .object_entries()
                    .ok()
                    .and_then(|entries| entries.get(index).map(|(_, value)| value.clone()))
            })
    }
}

impl ExecutorIter for LinearIter {
    fn it_value(&self) -> Variant {
        self.at(self.index).unwrap_or_else(Variant::undefined)
    }

    fn it_next(&mut self) -> bool {
        self.index += 1;
        self.index < self.size()
    }
}

/// The default executor: members of `on`, in order.
pub struct LinearExecutor;

impl Executor for LinearExecutor {
    fn name(&self) -> &'static str {
        "LINEAR"
    }

    fn iterate(
        &self,
        on: &Variant,
        _with: &Variant,
        _param: &str,
    ) -> CoreResult<Box<dyn ExecutorIter>> {
        let iter = LinearIter {
            source: on.clone(),
            index: 0,
        };
        if iter.size() == 0 {
            return Err(CoreError::not_exists("empty iteration source"));
        }
        Ok(Box::new(iter))
    }
}

struct RangeIter {
    current: f64,
    to: f64,
    advance: f64,
}

impl ExecutorIter for RangeIter {
    fn it_value(&self) -> Variant {
        Variant::number(self.current)
    }

    fn it_next(&mut self) -> bool {
        self.current += self.advance;
        if self.advance > 0.0 {
            self.current <= self.to
        } else {
            self.current >= self.to
        }
    }
}

/// `RANGE: FROM a TO b [ADVANCE k]`.
pub struct RangeExecutor;

impl RangeExecutor {
    fn parse(param: &str) -> CoreResult<(f64, f64, f64)> {
        let words: Vec<&str> = param.split_whitespace().collect();
        let mut from = None;
        let mut to = None;
        let mut advance = None;

        let mut idx = 0;
        while let Some(keyword) = words.get(idx) {
            let number = words
                .get(idx + 1)
                .and_then(|w| w.parse::<f64>().ok())
                .ok_or_else(|| {
                    CoreError::invalid_value(format!("RANGE clause '{keyword}' needs a number"))
                })?;
            if keyword.eq_ignore_ascii_case("FROM") {
                from = Some(number);
            } else if keyword.eq_ignore_ascii_case("TO") {
                to = Some(number);
            } else if keyword.eq_ignore_ascii_case("ADVANCE") {
                advance = Some(number);
            } else {
                return Err(CoreError::invalid_value(format!(
                    "unknown RANGE clause '{keyword}'"
                )));
            }
            idx += 2;
        }

        let from = from.ok_or_else(|| CoreError::argument_missed("FROM"))?;
        let to = to.ok_or_else(|| CoreError::argument_missed("TO"))?;
        let advance = advance.unwrap_or(if from <= to { 1.0 } else { -1.0 });
        if advance == 0.0 {
            return Err(CoreError::invalid_value("RANGE cannot advance by zero"));
        }
        Ok((from, to, advance))
    }
}

impl Executor for RangeExecutor {
    fn name(&self) -> &'static str {
        "RANGE"
    }

    fn iterate(
        &self,
        _on: &Variant,
        _with: &Variant,
        param: &str,
    ) -> CoreResult<Box<dyn ExecutorIter>> {
        let (from, to, advance) = Self::parse(param)?;
        if (advance > 0.0 && from > to) || (advance < 0.0 && from < to) {
            return Err(CoreError::not_exists("empty range"));
        }
        Ok(Box::new(RangeIter {
            current: from,
            to,
            advance,
        }))
    }
}

/// The executor registry, keyed by uppercase rule name.
pub struct ExecutorRegistry {
    executors: HashMap<String, Rc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// A registry with the built-ins installed.
    pub fn with_builtins() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry {
            executors: HashMap::new(),
        };
        registry.register(Rc::new(LinearExecutor));
        registry.register(Rc::new(RangeExecutor));
        registry
    }

    /// Installs an executor under its name.
    pub fn register(&mut self, executor: Rc<dyn Executor>) {
        self.executors
            .insert(executor.name().to_string(), executor);
    }

    /// Splits a rule into `(executor, param)`. An empty rule selects the
    /// linear executor.
    pub fn by_rule(&self, rule: &str) -> CoreResult<(Rc<dyn Executor>, String)> {
        let rule = rule.trim();
        if rule.is_empty() {
            let executor = self
                .executors
                .get("LINEAR")
                .cloned()
                .ok_or_else(|| CoreError::entity_not_found("LINEAR executor"))?;
            return Ok((executor, String::new()));
        }

        let (name, param) = match rule.split_once(':') {
            Some((name, param)) => (name.trim(), param.trim()),
            None => (rule, ""),
        };

        let executor = self
            .executors
            .get(&name.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| {
                CoreError::not_supported(format!("no executor for rule '{name}'"))
            })?;
        Ok((executor, param.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(mut iter: Box<dyn ExecutorIter>) -> Vec<Variant> {
        let mut out = vec![iter.it_value()];
        while iter.it_next() {
            out.push(iter.it_value());
        }
        out
    }

    #[test]
    fn test_linear_over_array() {
        let registry = ExecutorRegistry::with_builtins();
        let (executor, param) = registry.by_rule("").unwrap();
        let source = Variant::array(vec![
            Variant::longint(1),
            Variant::longint(2),
            Variant::longint(3),
        ]);
        let values = collect(executor.iterate(&source, &Variant::undefined(), &param).unwrap());
        assert_eq!(values.len(), 3);
        assert_eq!(values[2].as_longint(), Some(3));
    }

    #[test]
    fn test_linear_empty_is_not_exists() {
        let registry = ExecutorRegistry::with_builtins();
        let (executor, param) = registry.by_rule("").unwrap();
        let result = executor.iterate(&Variant::array(vec![]), &Variant::undefined(), &param);
        assert!(matches!(result, Err(CoreError::NotExists { .. })));
    }

    #[test]
    fn test_range_rule() {
        let registry = ExecutorRegistry::with_builtins();
        let (executor, param) = registry.by_rule("RANGE: FROM 0 TO 6 ADVANCE 2").unwrap();
        let values = collect(
            executor
                .iterate(&Variant::undefined(), &Variant::undefined(), &param)
                .unwrap(),
        );
        let numbers: Vec<f64> = values.iter().map(|v| v.numberize()).collect();
        assert_eq!(numbers, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_unknown_rule() {
        let registry = ExecutorRegistry::with_builtins();
        assert!(matches!(
            registry.by_rule("TRAVEL: EVERYWHERE"),
            Err(CoreError::NotSupported { .. })
        ));
    }

    #[test]
    fn test_default_reduce_statistics() {
        let registry = ExecutorRegistry::with_builtins();
        let (executor, param) = registry.by_rule("").unwrap();
        let source = Variant::array(vec![
            Variant::longint(2),
            Variant::longint(4),
            Variant::longint(6),
        ]);
        let stats = executor
            .reduce(&source, &Variant::undefined(), &param)
            .unwrap();
        assert_eq!(stats.object_get("count").unwrap().as_ulongint(), Some(3));
        assert_eq!(stats.object_get("sum").unwrap().numberize(), 12.0);
        assert_eq!(stats.object_get("avg").unwrap().numberize(), 4.0);
        assert_eq!(stats.object_get("max").unwrap().numberize(), 6.0);
        assert_eq!(stats.object_get("min").unwrap().numberize(), 2.0);
    }
}
