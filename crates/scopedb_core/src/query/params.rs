//! Bound parameters.

use super::parser::Operand;
use crate::error::{CoreError, CoreResult};
use scopedb_codec::Value;
use std::collections::{BTreeMap, HashMap};

/// Parameters passed to [`crate::Cursor::execute`].
///
/// Parameters must be a sequence (bound to `%s` in order) or a mapping
/// (bound to `%(name)s`). A bare scalar converts into [`Params::Scalar`] so
/// that the mistake is reported as a validation error at execution time
/// rather than silently treated as a one-element sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Values for `%s` placeholders, in order.
    Positional(Vec<Value>),
    /// Values for `%(name)s` placeholders.
    Named(BTreeMap<String, Value>),
    /// A single value where a sequence or mapping was required. Always
    /// rejected.
    Scalar(Value),
}

impl Params {
    /// Builds positional parameters.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Builds named parameters.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Resolves every operand to a value.
    ///
    /// # Errors
    ///
    /// Returns a validation error for scalar parameters, a placeholder
    /// count or name mismatch, or a statement mixing `%s` and `%(name)s`.
    pub fn bind(&self, operands: &[&Operand]) -> CoreResult<Vec<Value>> {
        if let Self::Scalar(value) = self {
            return Err(CoreError::validation(format!(
                "query parameters must be a sequence or a mapping, not {}",
                value.type_name()
            )));
        }

        let positional = operands.iter().filter(|o| matches!(o, Operand::Positional)).count();
        let named = operands.iter().filter(|o| matches!(o, Operand::Named(_))).count();
        if positional > 0 && named > 0 {
            return Err(CoreError::validation(
                "statement mixes positional and named placeholders",
            ));
        }

        let supplied = match self {
            Self::Positional(values) => values.len(),
            _ => 0,
        };
        if supplied != positional {
            return Err(CoreError::validation(format!(
                "statement has {positional} positional placeholder(s) but {supplied} value(s) were supplied"
            )));
        }
        if named > 0 && !matches!(self, Self::Named(_)) {
            return Err(CoreError::validation(
                "named placeholders require a mapping of parameters",
            ));
        }

        let mut next_positional = 0;
        operands
            .iter()
            .map(|operand| match (operand, self) {
                (Operand::Literal(value), _) => Ok(value.clone()),
                (Operand::Positional, Self::Positional(values)) => {
                    let value = values[next_positional].clone();
                    next_positional += 1;
                    Ok(value)
                }
                (Operand::Named(name), Self::Named(map)) => map.get(name).cloned().ok_or_else(|| {
                    CoreError::validation(format!("missing value for placeholder %({name})s"))
                }),
                _ => Err(CoreError::validation("placeholder does not match parameters")),
            })
            .collect()
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl<V: Into<Value>> From<Vec<V>> for Params {
    fn from(values: Vec<V>) -> Self {
        Self::positional(values)
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Params {
    fn from(values: [V; N]) -> Self {
        Self::positional(values)
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Params {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::named(map)
    }
}

impl<K: Into<String>, V: Into<Value>, S> From<HashMap<K, V, S>> for Params {
    fn from(map: HashMap<K, V, S>) -> Self {
        Self::named(map)
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! scalar_params {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Params {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_params!(&str, String, i64, i32, bool);

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(list: &[Operand]) -> Vec<&Operand> {
        list.iter().collect()
    }

    #[test]
    fn scalar_is_rejected() {
        let operands = [Operand::Positional];
        for params in [
            Params::from("admin"),
            Params::from(String::from("admin")),
            Params::from(42_i64),
            Params::from(7_i32),
            Params::from(true),
            Params::from(Value::Null),
        ] {
            let err = params.bind(&ops(&operands)).unwrap_err();
            assert!(err.is_validation());
            assert!(err.to_string().contains("sequence or a mapping"));
        }
    }

    #[test]
    fn scalar_is_rejected_without_placeholders() {
        let operands = [Operand::Literal(Value::from("t"))];
        assert!(Params::from("x").bind(&ops(&operands)).is_err());
    }

    #[test]
    fn positional_binds_in_order() {
        let operands = [
            Operand::Positional,
            Operand::Literal(Value::from("k")),
            Operand::Positional,
        ];
        let bound = Params::from(vec!["t", "v"]).bind(&ops(&operands)).unwrap();
        assert_eq!(bound, vec![Value::from("t"), Value::from("k"), Value::from("v")]);
    }

    #[test]
    fn positional_count_must_match() {
        let operands = [Operand::Positional, Operand::Positional];
        assert!(Params::from(["a"]).bind(&ops(&operands)).is_err());
        assert!(Params::from(["a", "b", "c"]).bind(&ops(&operands)).is_err());
        assert!(Params::None.bind(&ops(&operands)).is_err());
        assert!(Params::from(["a", "b"]).bind(&ops(&operands)).is_ok());
    }

    #[test]
    fn named_binds_by_name() {
        let operands = [Operand::Named("login".to_string())];
        let mut map = HashMap::new();
        map.insert("login", "admin");
        map.insert("unused", "x");
        let bound = Params::from(map).bind(&ops(&operands)).unwrap();
        assert_eq!(bound, vec![Value::from("admin")]);

        let missing = Params::named([("other", 1)]).bind(&ops(&operands));
        assert!(missing.unwrap_err().to_string().contains("%(login)s"));
        assert!(Params::from(vec!["admin"]).bind(&ops(&operands)).is_err());
    }

    #[test]
    fn mixing_placeholders_is_rejected() {
        let operands = [Operand::Positional, Operand::Named("a".to_string())];
        assert!(Params::named([("a", 1)]).bind(&ops(&operands)).is_err());
    }

    #[test]
    fn no_placeholders_accepts_empty_params() {
        let operands = [Operand::Literal(Value::from("t"))];
        assert!(Params::None.bind(&ops(&operands)).is_ok());
        assert!(Params::from(()).bind(&ops(&operands)).is_ok());
        assert!(Params::from(Vec::<Value>::new()).bind(&ops(&operands)).is_ok());
    }
}
