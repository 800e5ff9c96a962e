//! URL -> overload candidates, built once per catalog load.

use crate::catalog::Routine;
use crate::config::RoutineOptions;
use crate::endpoint::{synthesize, EndpointDescriptor};
use crate::hooks::SynthesisHooks;
use std::collections::HashMap;

#[derive(Debug)]
pub struct Endpoint {
    pub routine: Routine,
    pub descriptor: EndpointDescriptor,
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    by_url: HashMap<String, Vec<Endpoint>>,
    count: usize,
}

impl RoutingTable {
    pub fn empty() -> Self {
        RoutingTable::default()
    }

    /// Synthesize an endpoint per routine and group them by lower-cased URL.
    /// Candidates under one URL keep catalog order.
    pub fn build(routines: Vec<Routine>, options: &RoutineOptions, hooks: &SynthesisHooks) -> Self {
        let mut table = RoutingTable::default();
        for routine in routines {
            let Some(descriptor) = synthesize(&routine, options, hooks) else {
                continue;
            };
            tracing::info!(
                method = ?descriptor.method,
                url = %descriptor.url,
                routine = %routine.qualified_name(),
                "endpoint"
            );
            table.insert(Endpoint { routine, descriptor });
        }
        table
    }

    pub fn insert(&mut self, endpoint: Endpoint) {
        self.by_url
            .entry(endpoint.descriptor.url.to_lowercase())
            .or_default()
            .push(endpoint);
        self.count += 1;
    }

    pub fn lookup(&self, path: &str) -> Option<&[Endpoint]> {
        self.by_url.get(&path.to_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.by_url.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RoutineRow;
    use crate::config::CommentsMode;

    fn routine(name: &str, args: &[&str], comment: &str) -> Routine {
        Routine::from(RoutineRow {
            schema: "public".into(),
            name: name.into(),
            kind: "f".into(),
            language: "sql".into(),
            comment: Some(comment.into()),
            volatility: "v".into(),
            return_type: "text".into(),
            return_type_kind: "b".into(),
            arg_names: args.iter().map(|a| a.to_string()).collect(),
            arg_types: args.iter().map(|_| "integer".to_string()).collect(),
            arg_modes: args.iter().map(|_| "i".to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn overloads_share_a_url_in_catalog_order() {
        let routines = vec![
            routine("calc", &[], "HTTP"),
            routine("calc", &["i"], "HTTP"),
            routine("calc", &["i", "j"], "HTTP"),
            routine("other", &[], "no tag"),
        ];
        let table = RoutingTable::build(routines, &RoutineOptions::default(), &SynthesisHooks::default());
        assert_eq!(table.len(), 3);
        let candidates = table.lookup("/api/calc/").unwrap();
        let arities: Vec<usize> = candidates.iter().map(|e| e.routine.params.len()).collect();
        assert_eq!(arities, [0, 1, 2]);
        assert!(table.lookup("/api/other/").is_none());
    }

    #[test]
    fn lookup_is_case_insensitive_and_exact() {
        let opts = RoutineOptions {
            comments_mode: CommentsMode::ParseAll,
            ..Default::default()
        };
        let table = RoutingTable::build(
            vec![routine("report", &[], "HTTP GET /Reports/Monthly")],
            &opts,
            &SynthesisHooks::default(),
        );
        assert!(table.lookup("/reports/monthly").is_some());
        assert!(table.lookup("/REPORTS/MONTHLY").is_some());
        assert!(table.lookup("/reports/monthly/").is_none());
        assert_eq!(table.endpoints().count(), 1);
    }
}
