//! Builds the parameterized call statement for a routine. Identifiers come from the catalog only.

use crate::catalog::{ReturnShape, Routine, RoutineKind};

/// Quote identifier for PostgreSQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Schema-qualified routine name.
fn qualified_routine(schema: &str, name: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(name))
}

/// `$1::integer, variadic $2::text[]`; procedure OUT positions are passed as `null`.
fn argument_list(routine: &Routine) -> String {
    let mut args = Vec::with_capacity(routine.arg_modes.len());
    let mut n = 0usize;
    for mode in &routine.arg_modes {
        match mode {
            'o' if routine.kind == RoutineKind::Procedure => args.push("null".to_string()),
            'o' | 't' => {}
            _ => {
                let param = &routine.params[n];
                n += 1;
                let prefix = if *mode == 'v' { "variadic " } else { "" };
                args.push(format!("{}${}::{}", prefix, n, param.type_name));
            }
        }
    }
    args.join(", ")
}

/// Results are cast to text so every PostgreSQL type decodes the same way.
pub fn call_expression(routine: &Routine) -> String {
    let target = format!("{}({})", qualified_routine(&routine.schema, &routine.name), argument_list(routine));
    match (routine.kind, routine.shape) {
        (RoutineKind::Procedure, _) => format!("call {target}"),
        (_, ReturnShape::Void) => format!("select {target}"),
        (_, ReturnShape::Scalar | ReturnShape::SetOfScalar) => format!("select {target}::text"),
        (_, ReturnShape::Record | ReturnShape::SetOfRecord) => {
            let columns = routine
                .columns
                .iter()
                .map(|c| format!("{}::text", quoted(&c.name)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("select {columns} from {target}")
        }
    }
}
