//! Routine metadata as read from the catalog.

use crate::pg_type::TypeDescriptor;
use crate::sql::call_expression;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutineKind {
    Function,
    Procedure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityMode {
    Invoker,
    Definer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
}

/// What a call produces, decided once when the routine is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    Scalar,
    SetOfScalar,
    Record,
    SetOfRecord,
}

impl ReturnShape {
    pub fn is_record(self) -> bool {
        matches!(self, ReturnShape::Record | ReturnShape::SetOfRecord)
    }
}

/// Input argument (modes IN, INOUT, VARIADIC).
#[derive(Clone, Debug, PartialEq)]
pub struct RoutineParam {
    pub name: String,
    pub type_name: String,
    pub has_default: bool,
    pub descriptor: TypeDescriptor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnColumn {
    pub name: String,
    pub type_name: String,
    pub descriptor: TypeDescriptor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Routine {
    pub schema: String,
    pub name: String,
    pub kind: RoutineKind,
    pub language: String,
    pub comment: Option<String>,
    pub is_strict: bool,
    pub security: SecurityMode,
    pub volatility: Volatility,
    pub params: Vec<RoutineParam>,
    /// Last parameter is VARIADIC.
    pub variadic: bool,
    /// Argument modes in declaration order (`i`, `o`, `b`, `v`, `t`), OUT arguments included.
    pub arg_modes: Vec<char>,
    pub return_type: String,
    pub return_descriptor: TypeDescriptor,
    pub returns_set: bool,
    pub shape: ReturnShape,
    pub columns: Vec<ReturnColumn>,
    /// SQL executed per request, parameters as `$1..$n`.
    pub call_expression: String,
}

impl Routine {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// One row of the catalog query.
#[derive(Clone, Debug, Default, sqlx::FromRow)]
pub struct RoutineRow {
    pub schema: String,
    pub name: String,
    pub kind: String,
    pub language: String,
    pub comment: Option<String>,
    pub is_strict: bool,
    pub security_definer: bool,
    pub volatility: String,
    pub returns_set: bool,
    pub return_type: String,
    pub return_type_kind: String,
    pub arg_defaults: i32,
    pub arg_names: Vec<String>,
    pub arg_types: Vec<String>,
    pub arg_modes: Vec<String>,
    pub composite_names: Vec<String>,
    pub composite_types: Vec<String>,
}

fn mode_of(modes: &[String], i: usize) -> char {
    modes.get(i).and_then(|m| m.chars().next()).unwrap_or('i')
}

impl From<RoutineRow> for Routine {
    fn from(row: RoutineRow) -> Self {
        let kind = if row.kind == "p" {
            RoutineKind::Procedure
        } else {
            RoutineKind::Function
        };
        let arg_modes: Vec<char> = (0..row.arg_types.len()).map(|i| mode_of(&row.arg_modes, i)).collect();

        let mut params = Vec::new();
        let mut out_columns = Vec::new();
        let mut has_table_column = false;
        for (i, type_name) in row.arg_types.iter().enumerate() {
            let name = row
                .arg_names
                .get(i)
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("${}", i + 1));
            let mode = arg_modes[i];
            if matches!(mode, 'i' | 'b' | 'v') {
                params.push(RoutineParam {
                    name: name.clone(),
                    type_name: type_name.clone(),
                    has_default: false,
                    descriptor: TypeDescriptor::parse(type_name),
                });
            }
            if matches!(mode, 'o' | 'b' | 't') {
                has_table_column |= mode == 't';
                out_columns.push(ReturnColumn {
                    name,
                    type_name: type_name.clone(),
                    descriptor: TypeDescriptor::parse(type_name),
                });
            }
        }
        // defaults belong to the trailing input parameters
        let defaults = usize::try_from(row.arg_defaults).unwrap_or(0).min(params.len());
        let first_default = params.len() - defaults;
        for p in params.iter_mut().skip(first_default) {
            p.has_default = true;
        }
        let variadic = arg_modes.last() == Some(&'v');

        let composite: Vec<ReturnColumn> = row
            .composite_names
            .iter()
            .zip(&row.composite_types)
            .map(|(name, type_name)| ReturnColumn {
                name: name.clone(),
                type_name: type_name.clone(),
                descriptor: TypeDescriptor::parse(type_name),
            })
            .collect();

        let (shape, columns) = match kind {
            RoutineKind::Procedure if out_columns.is_empty() => (ReturnShape::Void, Vec::new()),
            RoutineKind::Procedure => (ReturnShape::Record, out_columns),
            RoutineKind::Function if row.return_type == "void" => (ReturnShape::Void, Vec::new()),
            RoutineKind::Function => {
                let columns = if out_columns.len() > 1 || has_table_column {
                    out_columns
                } else if out_columns.is_empty() && row.return_type_kind == "c" {
                    composite
                } else {
                    Vec::new()
                };
                let shape = match (columns.is_empty(), row.returns_set) {
                    (true, false) => ReturnShape::Scalar,
                    (true, true) => ReturnShape::SetOfScalar,
                    (false, false) => ReturnShape::Record,
                    (false, true) => ReturnShape::SetOfRecord,
                };
                (shape, columns)
            }
        };

        let mut routine = Routine {
            return_descriptor: TypeDescriptor::parse(&row.return_type),
            schema: row.schema,
            name: row.name,
            kind,
            language: row.language,
            comment: row.comment,
            is_strict: row.is_strict,
            security: if row.security_definer {
                SecurityMode::Definer
            } else {
                SecurityMode::Invoker
            },
            volatility: match row.volatility.as_str() {
                "i" => Volatility::Immutable,
                "s" => Volatility::Stable,
                _ => Volatility::Volatile,
            },
            params,
            variadic,
            arg_modes,
            return_type: row.return_type,
            returns_set: row.returns_set,
            shape,
            columns,
            call_expression: String::new(),
        };
        routine.call_expression = call_expression(&routine);
        routine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, return_type: &str, args: &[(&str, &str, &str)]) -> RoutineRow {
        RoutineRow {
            schema: "public".into(),
            name: name.into(),
            kind: "f".into(),
            language: "sql".into(),
            volatility: "v".into(),
            return_type: return_type.into(),
            return_type_kind: "b".into(),
            arg_names: args.iter().map(|a| a.0.to_string()).collect(),
            arg_types: args.iter().map(|a| a.1.to_string()).collect(),
            arg_modes: args.iter().map(|a| a.2.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn scalar_function() {
        let r = Routine::from(row("add", "integer", &[("a", "integer", "i"), ("b", "integer", "i")]));
        assert_eq!(r.shape, ReturnShape::Scalar);
        assert_eq!(r.params.len(), 2);
        assert!(r.columns.is_empty());
        assert_eq!(r.call_expression, r#"select "public"."add"($1::integer, $2::integer)::text"#);
    }

    #[test]
    fn table_function_columns_come_from_table_args() {
        let mut rr = row(
            "get_users",
            "record",
            &[("_active", "boolean", "i"), ("user_id", "integer", "t"), ("user_name", "text", "t")],
        );
        rr.returns_set = true;
        rr.return_type_kind = "p".into();
        let r = Routine::from(rr);
        assert_eq!(r.shape, ReturnShape::SetOfRecord);
        assert_eq!(r.params.len(), 1);
        assert_eq!(r.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["user_id", "user_name"]);
    }

    #[test]
    fn single_out_parameter_is_scalar() {
        let r = Routine::from(row("get_count", "bigint", &[("n", "bigint", "o")]));
        assert_eq!(r.shape, ReturnShape::Scalar);
        assert!(r.params.is_empty());
    }

    #[test]
    fn composite_return_uses_attributes() {
        let mut rr = row("get_account", "account", &[("id", "integer", "i")]);
        rr.return_type_kind = "c".into();
        rr.composite_names = vec!["id".into(), "balance".into()];
        rr.composite_types = vec!["integer".into(), "numeric(12,2)".into()];
        let r = Routine::from(rr);
        assert_eq!(r.shape, ReturnShape::Record);
        assert_eq!(r.columns[1].type_name, "numeric(12,2)");
    }

    #[test]
    fn procedures_defaults_and_variadic() {
        let mut rr = row("log_all", "void", &[("level", "text", "i"), ("messages", "text[]", "v")]);
        rr.kind = "p".into();
        rr.arg_defaults = 1;
        let r = Routine::from(rr);
        assert_eq!(r.kind, RoutineKind::Procedure);
        assert_eq!(r.shape, ReturnShape::Void);
        assert!(r.variadic);
        assert!(!r.params[0].has_default);
        assert!(r.params[1].has_default);
    }

    #[test]
    fn unnamed_arguments_get_positional_names() {
        let r = Routine::from(row("f", "text", &[("", "text", "i")]));
        assert_eq!(r.params[0].name, "$1");
    }
}
