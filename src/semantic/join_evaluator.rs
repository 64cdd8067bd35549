//! Join Evaluator.
//!
//! Decides whether two semantic models can be joined on an entity without
//! fan-out, and classifies the join. Every valid (left, right, entity) triple
//! becomes an edge of a directed graph built once at construction.
//!
//! Invalid joins are an expected outcome, so they come back as `None`/`false`
//! rather than errors.

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::{EntityReference, EntityType, SemanticModelReference};

use super::linkable::types::SemanticModelJoinPath;
use super::model_index::SemanticModelAccessor;

/// Hop limit of [`JoinEvaluator::get_joinable_semantic_models`].
pub const MAX_JOIN_HOPS: usize = 2;

/// Row multiplicity of a join, left side first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Whether a left row can match several right rows.
    pub fn causes_fanout(self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToOne => "many_to_one",
            Cardinality::ManyToMany => "many_to_many",
        }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a (left, right) entity-type pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPairRule {
    Valid(Cardinality),
    /// Valid only when the right model declares a validity window.
    RequiresRightValidityWindow(Cardinality),
    /// Rejected; carries the multiplicity that would fan out.
    Invalid(Cardinality),
}

/// The fan-out table.
///
/// Joining into a primary or unique key yields at most one row. A foreign
/// right side can yield many. A natural right side is unique only within a
/// validity window. Natural to natural is never allowed.
pub fn entity_pair_rule(left: EntityType, right: EntityType) -> EntityPairRule {
    use EntityType::*;
    match (left, right) {
        (Primary | Unique, Primary | Unique) => EntityPairRule::Valid(Cardinality::OneToOne),
        (Foreign | Natural, Primary | Unique) => EntityPairRule::Valid(Cardinality::ManyToOne),
        (Primary | Unique, Natural) => {
            EntityPairRule::RequiresRightValidityWindow(Cardinality::OneToOne)
        }
        (Foreign, Natural) => EntityPairRule::RequiresRightValidityWindow(Cardinality::ManyToOne),
        (Natural, Natural) => EntityPairRule::Invalid(Cardinality::ManyToMany),
        (Primary | Unique, Foreign) => EntityPairRule::Invalid(Cardinality::OneToMany),
        (Foreign | Natural, Foreign) => EntityPairRule::Invalid(Cardinality::ManyToMany),
    }
}

/// A valid join edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub entity: EntityReference,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone)]
struct ModelJoinInfo {
    entities: BTreeMap<EntityReference, EntityType>,
    has_validity_window: bool,
}

/// Join validity over an indexed manifest. Read-only after construction.
#[derive(Debug, Clone)]
pub struct JoinEvaluator {
    graph: DiGraph<SemanticModelReference, JoinEdge>,
    node_indices: HashMap<SemanticModelReference, NodeIndex>,
    models: BTreeMap<SemanticModelReference, ModelJoinInfo>,
}

impl JoinEvaluator {
    pub fn new<A: SemanticModelAccessor + ?Sized>(index: &A) -> Self {
        let models: BTreeMap<SemanticModelReference, ModelJoinInfo> = index
            .semantic_models()
            .into_iter()
            .map(|model| {
                let info = ModelJoinInfo {
                    entities: model
                        .entities
                        .iter()
                        .map(|e| (e.reference(), e.entity_type))
                        .collect(),
                    has_validity_window: model.has_validity_window(),
                };
                (model.reference(), info)
            })
            .collect();

        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        for reference in models.keys() {
            let idx = graph.add_node(reference.clone());
            node_indices.insert(reference.clone(), idx);
        }

        let mut evaluator = Self {
            graph,
            node_indices,
            models,
        };

        let mut edges = Vec::new();
        for (left, left_info) in &evaluator.models {
            for (right, right_info) in &evaluator.models {
                if left == right {
                    continue;
                }
                for entity in left_info.entities.keys() {
                    if !right_info.entities.contains_key(entity) {
                        continue;
                    }
                    if let Some(cardinality) = evaluator.semantic_model_join_type(left, right, entity)
                    {
                        edges.push((
                            evaluator.node_indices[left],
                            evaluator.node_indices[right],
                            JoinEdge {
                                entity: entity.clone(),
                                cardinality,
                            },
                        ));
                    }
                }
            }
        }
        for (from, to, edge) in edges {
            evaluator.graph.add_edge(from, to, edge);
        }
        evaluator
    }

    /// Cardinality of joining `left` to `right` on `entity`, or `None` when
    /// the join is not safe.
    pub fn semantic_model_join_type(
        &self,
        left: &SemanticModelReference,
        right: &SemanticModelReference,
        entity: &EntityReference,
    ) -> Option<Cardinality> {
        let left_info = self.models.get(left)?;
        let right_info = self.models.get(right)?;
        let left_type = *left_info.entities.get(entity)?;
        let right_type = *right_info.entities.get(entity)?;

        if left_info.has_validity_window && right_info.has_validity_window {
            return None;
        }

        match entity_pair_rule(left_type, right_type) {
            EntityPairRule::Valid(cardinality) => Some(cardinality),
            EntityPairRule::RequiresRightValidityWindow(cardinality) => {
                right_info.has_validity_window.then_some(cardinality)
            }
            EntityPairRule::Invalid(_) => None,
        }
    }

    pub fn is_valid_semantic_model_join(
        &self,
        left: &SemanticModelReference,
        right: &SemanticModelReference,
        entity: &EntityReference,
    ) -> bool {
        self.semantic_model_join_type(left, right, entity).is_some()
    }

    /// Valid single-step joins out of `left`, sorted by target model then entity.
    pub fn outgoing_joins(&self, left: &SemanticModelReference) -> Vec<(SemanticModelReference, JoinEdge)> {
        let Some(&idx) = self.node_indices.get(left) else {
            return Vec::new();
        };
        let mut joins: Vec<(SemanticModelReference, JoinEdge)> = self
            .graph
            .edges(idx)
            .map(|edge| (self.graph[edge.target()].clone(), edge.weight().clone()))
            .collect();
        joins.sort_by(|a, b| (&a.0, &a.1.entity).cmp(&(&b.0, &b.1.entity)));
        joins
    }

    /// Shortest join path from `left` to every reachable model.
    ///
    /// Breadth-first up to [`MAX_JOIN_HOPS`] hops (one hop unless
    /// `include_multi_hop`). The first path found to a model is kept; ties
    /// go to the smaller target model name, then the smaller entity name.
    pub fn get_joinable_semantic_models(
        &self,
        left: &SemanticModelReference,
        include_multi_hop: bool,
    ) -> BTreeMap<SemanticModelReference, SemanticModelJoinPath> {
        let max_hops = if include_multi_hop { MAX_JOIN_HOPS } else { 1 };
        let mut found: BTreeMap<SemanticModelReference, SemanticModelJoinPath> = BTreeMap::new();

        let mut frontier: Vec<SemanticModelJoinPath> = Vec::new();
        for (target, edge) in self.outgoing_joins(left) {
            if found.contains_key(&target) {
                continue;
            }
            let path = SemanticModelJoinPath::from_single_element(target.clone(), edge.entity);
            found.insert(target, path.clone());
            frontier.push(path);
        }

        for _ in 1..max_hops {
            let mut next = Vec::new();
            for path in &frontier {
                for (target, edge) in self.outgoing_joins(path.last_semantic_model()) {
                    if found.contains_key(&target) {
                        continue;
                    }
                    if let Some(extended) = path.extend(left, target.clone(), edge.entity) {
                        found.insert(target, extended.clone());
                        next.push(extended);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        found
    }

    /// Join validity between row sets drawn from several models.
    ///
    /// Every right model must carry `entity`, at least one left model must
    /// carry it, and every such left model must join validly into every
    /// right model.
    pub fn is_valid_instance_set_join(
        &self,
        left_models: &[SemanticModelReference],
        right_models: &[SemanticModelReference],
        entity: &EntityReference,
    ) -> bool {
        if right_models.is_empty() {
            return false;
        }
        let carrying: Vec<&SemanticModelReference> = left_models
            .iter()
            .filter(|m| {
                self.models
                    .get(*m)
                    .is_some_and(|info| info.entities.contains_key(entity))
            })
            .collect();
        if carrying.is_empty() {
            return false;
        }
        right_models.iter().all(|right| {
            carrying
                .iter()
                .all(|left| self.is_valid_semantic_model_join(left, right, entity))
        })
    }

    /// Number of valid join edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
