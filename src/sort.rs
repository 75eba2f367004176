//! Dependency ordering of configs via their reference coordinates.
//!
//! Nodes are configs indexed by coordinate; an edge exists from a config to
//! each coordinate it references, meaning the referenced config must deploy
//! first. Kahn's algorithm produces the order; the ready set is kept sorted
//! by coordinate string so equal-depth nodes always come out in the same
//! order and repeated runs produce identical plans.

use std::collections::{BTreeSet, HashMap};

use crate::error::SortError;
use crate::model::{Config, Coordinate};

/// Topologically order `configs` for one environment.
///
/// References are plain coordinates, never pointers: the index is built
/// here and adjacency is derived lazily from each config's reference list.
/// Cross-project references work as long as both projects' configs are in
/// the input.
///
/// # Errors
///
/// Returns [`SortError::DanglingReference`] when a reference points at a
/// coordinate not present in the input, and [`SortError::CycleDetected`]
/// (listing the members) when the graph has no topological order. No partial
/// order is returned in either case.
pub fn sort_configs(configs: Vec<Config>) -> Result<Vec<Config>, SortError> {
    let index: HashMap<Coordinate, usize> = configs
        .iter()
        .enumerate()
        .map(|(i, c)| (c.coordinate.clone(), i))
        .collect();

    // Dangling references are fatal before any ordering is attempted.
    for config in &configs {
        for reference in &config.references {
            if !index.contains_key(reference) {
                return Err(SortError::DanglingReference {
                    from: config.coordinate.clone(),
                    to: reference.clone(),
                });
            }
        }
    }

    let mut in_degree: Vec<usize> = configs.iter().map(|c| c.references.len()).collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); configs.len()];
    for (i, config) in configs.iter().enumerate() {
        for reference in &config.references {
            if let Some(&dep_idx) = index.get(reference)
                && let Some(d) = dependents.get_mut(dep_idx)
            {
                d.push(i);
            }
        }
    }

    // Ready set ordered by coordinate string for deterministic tie-breaking.
    let mut ready: BTreeSet<(String, usize)> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(i, _)| (coordinate_key(&configs, i), i))
        .collect();

    let mut order: Vec<usize> = Vec::with_capacity(configs.len());
    while let Some((_, idx)) = ready.pop_first() {
        order.push(idx);
        if let Some(deps) = dependents.get(idx) {
            for &dependent in deps {
                if let Some(count) = in_degree.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((coordinate_key(&configs, dependent), dependent));
                    }
                }
            }
        }
    }

    if order.len() != configs.len() {
        return Err(SortError::CycleDetected {
            coordinates: cycle_members(&configs, &in_degree, &index),
        });
    }

    // Reorder by consuming the original vector without cloning configs.
    let mut slots: Vec<Option<Config>> = configs.into_iter().map(Some).collect();
    let mut sorted = Vec::with_capacity(order.len());
    for idx in order {
        if let Some(slot) = slots.get_mut(idx)
            && let Some(config) = slot.take()
        {
            sorted.push(config);
        }
    }
    Ok(sorted)
}

fn coordinate_key(configs: &[Config], idx: usize) -> String {
    configs
        .get(idx)
        .map(|c| c.coordinate.to_string())
        .unwrap_or_default()
}

/// Walk the unprocessed subgraph to present one cycle in reference order.
///
/// Starts at the smallest unprocessed coordinate and follows references
/// within the unprocessed set until a node repeats; the returned list ends
/// with the repeated coordinate so the loop is visible in the message.
fn cycle_members(
    configs: &[Config],
    in_degree: &[usize],
    index: &HashMap<Coordinate, usize>,
) -> Vec<String> {
    let unprocessed: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d > 0)
        .map(|(i, _)| i)
        .collect();

    let Some(&start) = unprocessed.iter().min_by_key(|&&i| coordinate_key(configs, i)) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    let mut current = start;
    loop {
        if let Some(pos) = path.iter().position(|&i| i == current) {
            let mut cycle: Vec<String> = path
                .get(pos..)
                .unwrap_or_default()
                .iter()
                .map(|&i| coordinate_key(configs, i))
                .collect();
            cycle.push(coordinate_key(configs, current));
            return cycle;
        }
        path.push(current);

        let next = configs
            .get(current)
            .map(|c| c.references.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|r| index.get(r).copied())
            .find(|i| unprocessed.contains(i));
        match next {
            Some(n) => current = n,
            // Should not happen for a true cycle member; bail with the path.
            None => return path.iter().map(|&i| coordinate_key(configs, i)).collect(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::model::{ConfigType, Parameter, Template};
    use std::collections::BTreeMap;

    fn make_config(project: &str, kind: &str, id: &str, refs: &[(&str, &str, &str)]) -> Config {
        let coordinate = Coordinate::new(project, kind, id);
        Config {
            coordinate,
            group: "default".to_string(),
            environment: "dev".to_string(),
            type_: ConfigType::ClassicApi {
                api: kind.to_string(),
                scope: None,
            },
            name: Parameter::Value(serde_json::json!(id)),
            parameters: BTreeMap::new(),
            template: Template {
                name: "t.json".to_string(),
                content: "{}".to_string(),
            },
            references: refs
                .iter()
                .map(|(p, k, i)| Coordinate::new(*p, *k, *i))
                .collect(),
            skip: false,
            origin_object_id: None,
        }
    }

    fn ids(sorted: &[Config]) -> Vec<String> {
        sorted.iter().map(|c| c.coordinate.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn independent_configs_sort_by_coordinate() {
        let configs = vec![
            make_config("p", "auto-tag", "zz", &[]),
            make_config("p", "auto-tag", "aa", &[]),
            make_config("p", "alerting-profile", "mm", &[]),
        ];
        let sorted = sort_configs(configs).unwrap();
        assert_eq!(
            ids(&sorted),
            vec!["p:alerting-profile:mm", "p:auto-tag:aa", "p:auto-tag:zz"]
        );
    }

    #[test]
    fn referenced_config_comes_first() {
        let configs = vec![
            make_config("p", "dashboard", "d", &[("p", "management-zone", "z")]),
            make_config("p", "management-zone", "z", &[]),
        ];
        let sorted = sort_configs(configs).unwrap();
        assert_eq!(ids(&sorted), vec!["p:management-zone:z", "p:dashboard:d"]);
    }

    #[test]
    fn chain_preserves_order() {
        let configs = vec![
            make_config("p", "k", "c", &[("p", "k", "b")]),
            make_config("p", "k", "a", &[]),
            make_config("p", "k", "b", &[("p", "k", "a")]),
        ];
        let sorted = sort_configs(configs).unwrap();
        assert_eq!(ids(&sorted), vec!["p:k:a", "p:k:b", "p:k:c"]);
    }

    #[test]
    fn diamond_resolves() {
        let configs = vec![
            make_config("p", "k", "d", &[("p", "k", "b"), ("p", "k", "c")]),
            make_config("p", "k", "b", &[("p", "k", "a")]),
            make_config("p", "k", "c", &[("p", "k", "a")]),
            make_config("p", "k", "a", &[]),
        ];
        let sorted = sort_configs(configs).unwrap();
        assert_eq!(ids(&sorted), vec!["p:k:a", "p:k:b", "p:k:c", "p:k:d"]);
    }

    #[test]
    fn cross_project_references_are_ordered() {
        let configs = vec![
            make_config("services", "dashboard", "d", &[("infra", "management-zone", "z")]),
            make_config("infra", "management-zone", "z", &[]),
        ];
        let sorted = sort_configs(configs).unwrap();
        assert_eq!(
            ids(&sorted),
            vec!["infra:management-zone:z", "services:dashboard:d"]
        );
    }

    #[test]
    fn all_infra_configs_precede_their_dependents() {
        let configs = vec![
            make_config("services", "k", "s1", &[("infra", "k", "i1")]),
            make_config("services", "k", "s2", &[("infra", "k", "i2")]),
            make_config("infra", "k", "i1", &[]),
            make_config("infra", "k", "i2", &[]),
        ];
        let sorted = sort_configs(configs).unwrap();
        let order = ids(&sorted);
        let last_infra = order.iter().rposition(|s| s.starts_with("infra")).unwrap();
        let first_services = order.iter().position(|s| s.starts_with("services")).unwrap();
        assert!(last_infra < first_services);
    }

    #[test]
    fn sort_is_stable_across_invocations() {
        let build = || {
            vec![
                make_config("p", "k", "m", &[]),
                make_config("p", "k", "a", &[("p", "k", "m")]),
                make_config("q", "k", "x", &[]),
                make_config("p", "k", "z", &[("p", "k", "m")]),
            ]
        };
        let first = ids(&sort_configs(build()).unwrap());
        for _ in 0..5 {
            assert_eq!(ids(&sort_configs(build()).unwrap()), first);
        }
    }

    #[test]
    fn empty_input_sorts_to_empty() {
        assert!(sort_configs(vec![]).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn dangling_reference_is_fatal() {
        let configs = vec![make_config(
            "p",
            "dashboard",
            "d",
            &[("p", "management-zone", "missing")],
        )];
        let err = sort_configs(configs).unwrap_err();
        let SortError::DanglingReference { from, to } = err else {
            panic!("expected DanglingReference, got {err:?}")
        };
        assert_eq!(from.to_string(), "p:dashboard:d");
        assert_eq!(to.to_string(), "p:management-zone:missing");
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let configs = vec![
            make_config("p", "k", "a", &[("p", "k", "b")]),
            make_config("p", "k", "b", &[("p", "k", "a")]),
        ];
        let err = sort_configs(configs).unwrap_err();
        let SortError::CycleDetected { coordinates } = err else {
            panic!("expected CycleDetected, got {err:?}")
        };
        assert_eq!(coordinates.first(), coordinates.last());
        assert!(coordinates.contains(&"p:k:a".to_string()));
        assert!(coordinates.contains(&"p:k:b".to_string()));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let configs = vec![make_config("p", "k", "a", &[("p", "k", "a")])];
        let err = sort_configs(configs).unwrap_err();
        assert!(matches!(err, SortError::CycleDetected { .. }));
    }

    #[test]
    fn cycle_with_independent_configs_still_fails() {
        let configs = vec![
            make_config("p", "k", "free", &[]),
            make_config("p", "k", "a", &[("p", "k", "b")]),
            make_config("p", "k", "b", &[("p", "k", "a")]),
        ];
        let err = sort_configs(configs).unwrap_err();
        let SortError::CycleDetected { coordinates } = err else {
            panic!("expected CycleDetected")
        };
        assert!(!coordinates.contains(&"p:k:free".to_string()));
    }
}
