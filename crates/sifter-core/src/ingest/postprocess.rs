use std::collections::HashMap;

use crate::entity::{Entity, EntityType};
use crate::relationship::{canonical_label, Relationship};

/// Names of the same type scoring strictly above this are merged.
pub const MERGE_THRESHOLD: f64 = 0.8;

/// Distinct entities that must share an attribute value before it is promoted.
pub const PROMOTION_THRESHOLD: usize = 3;

/// Attribute whose recurring values become entities of their own.
#[derive(Debug, Clone)]
pub struct PromotionRule {
    pub attribute: &'static str,
    pub entity_type: EntityType,
    pub label: &'static str,
}

impl PromotionRule {
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                attribute: "location",
                entity_type: EntityType::Place,
                label: "located_in",
            },
            Self {
                attribute: "event",
                entity_type: EntityType::Event,
                label: "attended",
            },
        ]
    }
}

/// Case-insensitive Dice coefficient over overlapping character bigrams.
///
/// Bigrams are counted as a multiset and whitespace is part of the text, so
/// "Ann Lee" and "Annlee" are not the same name. Strings too short to hold a
/// bigram only match when equal.
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }

    let mut counts = bigrams(&a);
    let total_a: usize = counts.values().sum();
    let pairs_b: Vec<(char, char)> = b.chars().zip(b.chars().skip(1)).collect();
    let total = total_a + pairs_b.len();
    if total == 0 {
        return 0.0;
    }

    let mut shared = 0usize;
    for pair in pairs_b {
        if let Some(count) = counts.get_mut(&pair).filter(|c| **c > 0) {
            *count -= 1;
            shared += 1;
        }
    }

    (2 * shared) as f64 / total as f64
}

fn bigrams(text: &str) -> HashMap<(char, char), usize> {
    let mut counts = HashMap::new();
    for pair in text.chars().zip(text.chars().skip(1)) {
        *counts.entry(pair).or_insert(0) += 1;
    }
    counts
}

/// Each word gets an upper-case first letter and lower-case remainder.
#[must_use]
pub fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct PostProcessor {
    merge_threshold: f64,
    min_references: usize,
    rules: Vec<PromotionRule>,
}

impl PostProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            merge_threshold: MERGE_THRESHOLD,
            min_references: PROMOTION_THRESHOLD,
            rules: PromotionRule::defaults(),
        }
    }

    #[must_use]
    pub fn with_merge_threshold(mut self, threshold: f64) -> Self {
        self.merge_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_min_references(mut self, count: usize) -> Self {
        self.min_references = count.max(1);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<PromotionRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Normalize names, merge near-duplicates, collapse repeated
    /// relationships, then promote recurring attribute values.
    ///
    /// Running the output through again changes nothing.
    #[must_use]
    pub fn process(
        &self,
        entities: Vec<Entity>,
        relationships: Vec<Relationship>,
    ) -> (Vec<Entity>, Vec<Relationship>) {
        let original_names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        let entities: Vec<Entity> = entities.into_iter().map(normalize_name).collect();

        let (mut entities, owners) = self.deduplicate_entities(entities);

        let resolver = NameResolver::build(&entities, &original_names, &owners);
        let mut relationships = deduplicate_relationships(
            relationships
                .into_iter()
                .map(|rel| resolver.rewrite(rel))
                .collect(),
        );

        for rule in &self.rules {
            self.promote(rule, &mut entities, &mut relationships);
        }

        (entities, relationships)
    }

    /// Merge every entity into the first earlier survivor of the same type
    /// whose name is similar enough. Returns the survivors plus, for each
    /// input position, the index of the survivor that absorbed it.
    fn deduplicate_entities(&self, entities: Vec<Entity>) -> (Vec<Entity>, Vec<usize>) {
        let mut survivors: Vec<Entity> = Vec::with_capacity(entities.len());
        let mut owners = Vec::with_capacity(entities.len());

        for entity in entities {
            let matched = survivors.iter().position(|s| {
                s.entity_type == entity.entity_type
                    && name_similarity(&s.name, &entity.name) > self.merge_threshold
            });

            match matched {
                Some(idx) => {
                    tracing::debug!(
                        survivor = %survivors[idx].name,
                        merged = %entity.name,
                        entity_type = %entity.entity_type,
                        "merging near-duplicate entity"
                    );
                    merge_into(&mut survivors[idx], entity);
                    owners.push(idx);
                }
                None => {
                    owners.push(survivors.len());
                    survivors.push(entity);
                }
            }
        }

        (survivors, owners)
    }

    fn promote(
        &self,
        rule: &PromotionRule,
        entities: &mut Vec<Entity>,
        relationships: &mut Vec<Relationship>,
    ) {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for (idx, entity) in entities.iter().enumerate() {
            let Some(value) = entity.attribute(rule.attribute) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            let slot = *group_index.entry(value.to_string()).or_insert_with(|| {
                groups.push((value.to_string(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(idx);
        }

        let mut existing: Vec<RelationshipKey> = relationships.iter().map(relationship_key).collect();

        for (raw_value, referrers) in groups {
            if referrers.len() < self.min_references {
                continue;
            }

            let value = raw_value.trim();
            let target_idx = self.find_or_create(rule, value, &referrers, entities);
            let target_name = entities[target_idx].name.clone();
            let mut linked = 0usize;

            for idx in referrers {
                let referrer = &entities[idx];
                if idx == target_idx || referrer.name.eq_ignore_ascii_case(&target_name) {
                    continue;
                }

                let mut rel = Relationship::new(referrer.name.clone(), target_name.clone(), rule.label)
                    .with_evidence(format!("{}: {value}", rule.attribute));
                rel.confidence = referrer.confidence;

                let key = relationship_key(&rel);
                if existing.contains(&key) {
                    continue;
                }
                existing.push(key);
                relationships.push(rel);
                linked += 1;
            }

            tracing::debug!(
                attribute = rule.attribute,
                value,
                target = %target_name,
                linked,
                "promoted attribute value"
            );
        }
    }

    /// Reuse an entity of the rule's type that dedup would consider the same,
    /// otherwise append a new one.
    fn find_or_create(
        &self,
        rule: &PromotionRule,
        value: &str,
        referrers: &[usize],
        entities: &mut Vec<Entity>,
    ) -> usize {
        let existing = entities.iter().position(|e| {
            e.entity_type == rule.entity_type
                && (e.name == value || name_similarity(&e.name, value) > self.merge_threshold)
        });
        if let Some(idx) = existing {
            return idx;
        }

        let confidence = referrers
            .iter()
            .filter_map(|&i| entities[i].confidence)
            .reduce(f64::max);

        let mut promoted = Entity::new(value, rule.entity_type.clone());
        promoted.confidence = confidence;
        entities.push(promoted);
        entities.len() - 1
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the default post-processing pass.
#[must_use]
pub fn post_process(
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
) -> (Vec<Entity>, Vec<Relationship>) {
    PostProcessor::default().process(entities, relationships)
}

fn normalize_name(mut entity: Entity) -> Entity {
    entity.name = if entity.entity_type == EntityType::Person {
        title_case(&entity.name)
    } else {
        entity.name.trim().to_string()
    };
    entity
}

/// First entity wins on attribute conflicts; blanks are filled from the
/// second. Highest confidence and longest evidence are kept.
fn merge_into(survivor: &mut Entity, other: Entity) {
    let other_evidence_len = other.evidence_len();
    for (key, value) in other.attributes {
        let slot = survivor.attributes.entry(key).or_default();
        if slot.trim().is_empty() {
            *slot = value;
        }
    }

    survivor.confidence = match (survivor.confidence, other.confidence) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    if other_evidence_len > survivor.evidence_len() {
        survivor.evidence = other.evidence;
    }
}

/// Maps any name an entity was known by, case-insensitively, to its
/// surviving name.
struct NameResolver {
    names: HashMap<String, String>,
}

impl NameResolver {
    fn build(survivors: &[Entity], original_names: &[String], owners: &[usize]) -> Self {
        let mut names = HashMap::new();

        for entity in survivors {
            names
                .entry(lookup_key(&entity.name))
                .or_insert_with(|| entity.name.clone());
        }
        for (original, &owner) in original_names.iter().zip(owners) {
            names
                .entry(lookup_key(original))
                .or_insert_with(|| survivors[owner].name.clone());
        }

        Self { names }
    }

    fn resolve(&self, name: &str) -> String {
        self.names
            .get(&lookup_key(name))
            .cloned()
            .unwrap_or_else(|| name.trim().to_string())
    }

    fn rewrite(&self, mut rel: Relationship) -> Relationship {
        rel.source = rel.source.as_deref().map(|s| self.resolve(s));
        rel.target = self.resolve(&rel.target);
        rel
    }
}

fn lookup_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

type RelationshipKey = (String, String, String);

fn relationship_key(rel: &Relationship) -> RelationshipKey {
    (
        rel.source.as_deref().map(lookup_key).unwrap_or_default(),
        lookup_key(&rel.target),
        canonical_label(&rel.relationship),
    )
}

/// Keep one relationship per key, preferring higher confidence and then
/// longer evidence. Self-referential relationships are dropped.
fn deduplicate_relationships(relationships: Vec<Relationship>) -> Vec<Relationship> {
    let mut kept: Vec<Relationship> = Vec::with_capacity(relationships.len());
    let mut positions: HashMap<RelationshipKey, usize> = HashMap::new();

    for rel in relationships {
        let key = relationship_key(&rel);
        if key.0 == key.1 {
            tracing::debug!(name = %rel.target, label = %rel.relationship, "dropping self-referential relationship");
            continue;
        }

        match positions.get(&key) {
            Some(&idx) => {
                if is_better(&rel, &kept[idx]) {
                    kept[idx] = rel;
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(rel);
            }
        }
    }

    kept
}

fn is_better(candidate: &Relationship, current: &Relationship) -> bool {
    let a = candidate.confidence.unwrap_or(-1.0);
    let b = current.confidence.unwrap_or(-1.0);
    if (a - b).abs() > f64::EPSILON {
        return a > b;
    }
    candidate.evidence_len() > current.evidence_len()
}
