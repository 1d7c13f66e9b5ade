//! Heuristic trust scores for extracted entities and relationships.
//!
//! Scores come from ordered decision tables; the first rule whose predicate
//! holds decides. Anything that already carries a confidence is left alone.
//!
//! Entities (`A` = populated attributes, `L` = evidence length in chars):
//!
//! | rule   | predicate            | score                              |
//! |--------|----------------------|------------------------------------|
//! | high   | `A >= 3 && L >= 80`  | 0.85 + 0.02 per extra attribute, <= 0.95 |
//! | medium | `A >= 1 && L > 0`    | 0.6 + 0.05 * min(A, 4), in [0.65, 0.8] |
//! | low    | `A == 0 && L > 0`    | 0.3 + 0.3 * min(L, 60) / 60, in (0.3, 0.6] |
//! | bare   | `L == 0`             | 0.2 + 0.05 * min(A, 4), <= 0.4     |
//!
//! Relationships:
//!
//! | rule     | predicate                                        | score |
//! |----------|--------------------------------------------------|-------|
//! | minimal  | `L < 20`, or < 10 alphanumerics left once the endpoint names are removed | 0.3 |
//! | explicit | specific label and `L >= 40`                     | 0.85  |
//! | generic  | everything else                                  | 0.5   |

use crate::entity::Entity;
use crate::relationship::Relationship;

pub const HIGH_EVIDENCE_CHARS: usize = 80;
pub const SUBSTANTIAL_EVIDENCE_CHARS: usize = 40;
pub const MINIMAL_EVIDENCE_CHARS: usize = 20;
const MINIMAL_RESIDUAL_ALNUM: usize = 10;

pub const EXPLICIT_RELATIONSHIP_SCORE: f64 = 0.85;
pub const GENERIC_RELATIONSHIP_SCORE: f64 = 0.5;
pub const MINIMAL_RELATIONSHIP_SCORE: f64 = 0.3;

#[derive(Debug, Clone, Copy)]
pub struct EntityFeatures {
    pub attributes: usize,
    pub evidence_len: usize,
}

impl EntityFeatures {
    #[must_use]
    pub fn of(entity: &Entity) -> Self {
        Self {
            attributes: entity.populated_attribute_count(),
            evidence_len: entity.evidence_len(),
        }
    }
}

pub struct EntityRule {
    pub band: &'static str,
    pub applies: fn(&EntityFeatures) -> bool,
    pub score: fn(&EntityFeatures) -> f64,
}

pub struct RelationshipRule {
    pub name: &'static str,
    pub applies: fn(&Relationship) -> bool,
    pub score: f64,
}

pub const ENTITY_RULES: &[EntityRule] = &[
    EntityRule {
        band: "high",
        applies: is_high,
        score: high_score,
    },
    EntityRule {
        band: "medium",
        applies: is_medium,
        score: medium_score,
    },
    EntityRule {
        band: "low",
        applies: is_low,
        score: low_score,
    },
    EntityRule {
        band: "bare",
        applies: is_bare,
        score: bare_score,
    },
];

pub const RELATIONSHIP_RULES: &[RelationshipRule] = &[
    RelationshipRule {
        name: "minimal",
        applies: has_minimal_evidence,
        score: MINIMAL_RELATIONSHIP_SCORE,
    },
    RelationshipRule {
        name: "explicit",
        applies: is_explicit_with_evidence,
        score: EXPLICIT_RELATIONSHIP_SCORE,
    },
    RelationshipRule {
        name: "generic",
        applies: always,
        score: GENERIC_RELATIONSHIP_SCORE,
    },
];

const fn is_high(f: &EntityFeatures) -> bool {
    f.attributes >= 3 && f.evidence_len >= HIGH_EVIDENCE_CHARS
}

fn high_score(f: &EntityFeatures) -> f64 {
    let extra = f.attributes.saturating_sub(3).min(5) as f64;
    (0.02f64.mul_add(extra, 0.85)).min(0.95)
}

const fn is_medium(f: &EntityFeatures) -> bool {
    f.attributes >= 1 && f.evidence_len > 0
}

fn medium_score(f: &EntityFeatures) -> f64 {
    (0.05f64.mul_add(f.attributes.min(4) as f64, 0.6)).min(0.8)
}

const fn is_low(f: &EntityFeatures) -> bool {
    f.attributes == 0 && f.evidence_len > 0
}

fn low_score(f: &EntityFeatures) -> f64 {
    (0.3 + 0.3 * f.evidence_len.min(60) as f64 / 60.0).min(0.6)
}

const fn is_bare(f: &EntityFeatures) -> bool {
    f.evidence_len == 0
}

fn bare_score(f: &EntityFeatures) -> f64 {
    (0.05f64.mul_add(f.attributes.min(4) as f64, 0.2)).min(0.4)
}

fn has_minimal_evidence(rel: &Relationship) -> bool {
    rel.evidence_len() < MINIMAL_EVIDENCE_CHARS || residual_alnum(rel) < MINIMAL_RESIDUAL_ALNUM
}

fn is_explicit_with_evidence(rel: &Relationship) -> bool {
    rel.is_explicit() && rel.evidence_len() >= SUBSTANTIAL_EVIDENCE_CHARS
}

const fn always(_: &Relationship) -> bool {
    true
}

/// Alphanumeric characters left in the evidence once both endpoint names
/// are removed.
fn residual_alnum(rel: &Relationship) -> usize {
    let Some(evidence) = rel.evidence.as_deref() else {
        return 0;
    };

    let mut text = evidence.to_lowercase();
    for name in [rel.source.as_deref(), Some(rel.target.as_str())]
        .into_iter()
        .flatten()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
    {
        text = text.replace(&name, " ");
    }

    text.chars().filter(|c| c.is_alphanumeric()).count()
}

/// Score from the first matching entity rule.
#[must_use]
pub fn score_entity(entity: &Entity) -> f64 {
    let features = EntityFeatures::of(entity);
    ENTITY_RULES
        .iter()
        .find(|rule| (rule.applies)(&features))
        .map_or(0.0, |rule| (rule.score)(&features))
}

/// Score from the first matching relationship rule.
#[must_use]
pub fn score_relationship(rel: &Relationship) -> f64 {
    RELATIONSHIP_RULES
        .iter()
        .find(|rule| (rule.applies)(rel))
        .map_or(GENERIC_RELATIONSHIP_SCORE, |rule| rule.score)
}

/// Fill in confidence wherever it is missing. Pre-scored records pass
/// through untouched.
#[must_use]
pub fn assign_confidence(
    mut entities: Vec<Entity>,
    mut relationships: Vec<Relationship>,
) -> (Vec<Entity>, Vec<Relationship>) {
    let mut scored = 0usize;

    for entity in &mut entities {
        if entity.confidence.is_none() {
            entity.confidence = Some(score_entity(entity));
            scored += 1;
        }
    }
    for rel in &mut relationships {
        if rel.confidence.is_none() {
            rel.confidence = Some(score_relationship(rel));
            scored += 1;
        }
    }

    tracing::debug!(
        scored,
        entities = entities.len(),
        relationships = relationships.len(),
        "assigned confidence"
    );

    (entities, relationships)
}
