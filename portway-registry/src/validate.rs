//! Registry-load-time invariant checks (`spec.md` §3 invariants ii-v, P3).
//! A descriptor that fails any of these is rejected before it ever reaches
//! a request handler.

use std::collections::{HashMap, HashSet};

use crate::definition::{EndpointDefinition, HttpMethod, ObjectType, ParamSource};
use crate::error::DescriptorError;

pub fn validate(def: &EndpointDefinition) -> Result<(), DescriptorError> {
    match def {
        EndpointDefinition::Sql(sql) => {
            let aliases: HashSet<&str> = sql
                .allowed_columns_raw
                .iter()
                .map(|raw| raw.split(':').next().unwrap_or(raw).trim())
                .collect();

            // Invariant (ii): every RequiredColumns entry resolves to a
            // real column (P3: required ⊆ keys(AllowedColumns)).
            for required in &sql.required_columns {
                if !aliases.contains(required.as_str()) {
                    return Err(DescriptorError::UnknownRequiredColumn(required.clone()));
                }
            }

            // Invariant (iv): DELETE requires a primary key.
            if sql.meta.allowed_methods.contains(&HttpMethod::Delete) && sql.primary_key.is_none() {
                return Err(DescriptorError::MissingPrimaryKeyForDelete);
            }

            // Invariant (v): TVF path parameter positions are 1-based and
            // contiguous for positions actually used.
            if sql.object_type == ObjectType::TableValuedFunction {
                let mut positions: Vec<u32> = sql
                    .parameters
                    .iter()
                    .filter(|p| p.source == ParamSource::Path)
                    .filter_map(|p| p.position)
                    .collect();
                positions.sort_unstable();
                for (idx, pos) in positions.iter().enumerate() {
                    if *pos != (idx as u32) + 1 {
                        return Err(DescriptorError::NonContiguousPathParameters);
                    }
                }
            }

            Ok(())
        }
        EndpointDefinition::Composite(composite) => {
            let mut seen = HashSet::new();
            for step in &composite.steps {
                // Invariant (iii): step names are unique within a composite.
                if !seen.insert(step.name.as_str()) {
                    return Err(DescriptorError::DuplicateStepName(step.name.clone()));
                }
            }
            let names: HashSet<&str> = composite.steps.iter().map(|s| s.name.as_str()).collect();
            for step in &composite.steps {
                for dep in &step.depends_on {
                    if !names.contains(dep.as_str()) {
                        return Err(DescriptorError::UnknownDependency(
                            step.name.clone(),
                            dep.clone(),
                        ));
                    }
                }
            }
            // Invariant (iii): DependsOn forms a DAG with no cycles.
            topo_sort(composite)?;
            Ok(())
        }
        EndpointDefinition::Proxy(_) | EndpointDefinition::File(_) | EndpointDefinition::Static(_) => {
            Ok(())
        }
    }
}

/// Kahn's algorithm; returns the step names in a valid execution order, or
/// a `DependencyCycle` error naming one step still unresolved when no more
/// progress can be made.
pub fn topo_sort(
    composite: &crate::definition::CompositeEndpoint,
) -> Result<Vec<String>, DescriptorError> {
    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for step in &composite.steps {
        indegree.entry(step.name.as_str()).or_insert(0);
        for dep in &step.depends_on {
            *indegree.entry(step.name.as_str()).or_insert(0) += 1;
            dependents.entry(dep.as_str()).or_default().push(step.name.as_str());
        }
    }

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&name, _)| name)
        .collect();
    ready.sort_unstable();

    let mut order = Vec::with_capacity(composite.steps.len());
    let mut queue = ready;
    while let Some(name) = queue.pop() {
        order.push(name.to_owned());
        if let Some(deps) = dependents.get(name) {
            let mut newly_ready = vec![];
            for &dependent in deps {
                let deg = indegree.get_mut(dependent).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(dependent);
                }
            }
            newly_ready.sort_unstable();
            queue.extend(newly_ready);
        }
    }

    if order.len() != composite.steps.len() {
        let stuck = composite
            .steps
            .iter()
            .map(|s| s.name.as_str())
            .find(|n| !order.contains(&(*n).to_owned()))
            .unwrap_or("?");
        return Err(DescriptorError::DependencyCycle(stuck.to_owned()));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CompositeEndpoint, CompositeStep, EndpointMeta};
    use serde_json::Map;

    fn meta(name: &str) -> EndpointMeta {
        EndpointMeta {
            name: name.to_owned(),
            namespace: None,
            allowed_methods: vec![],
            is_private: false,
            extra: Map::new(),
        }
    }

    fn step(name: &str, depends_on: &[&str]) -> CompositeStep {
        CompositeStep {
            name: name.to_owned(),
            endpoint: "SomeProxy".to_owned(),
            method: "POST".to_owned(),
            is_array: false,
            array_property: None,
            source_property: None,
            template_body: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            continue_on_error: false,
        }
    }

    #[test]
    fn topo_sort_orders_dependencies_before_dependents_p5() {
        let composite = CompositeEndpoint {
            meta: meta("SalesOrder"),
            steps: vec![step("AddLines", &["CreateOrder"]), step("CreateOrder", &[])],
        };
        let order = topo_sort(&composite).unwrap();
        let create_idx = order.iter().position(|s| s == "CreateOrder").unwrap();
        let lines_idx = order.iter().position(|s| s == "AddLines").unwrap();
        assert!(create_idx < lines_idx);
    }

    #[test]
    fn cyclic_dependencies_are_rejected() {
        let composite = CompositeEndpoint {
            meta: meta("Cyclic"),
            steps: vec![step("A", &["B"]), step("B", &["A"])],
        };
        assert!(topo_sort(&composite).is_err());
    }
}
