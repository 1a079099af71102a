//! Pairs board records with issue-tracker records that share no primary key.
//!
//! Tiers run in priority order and each only sees what higher tiers left
//! unpaired. An issue is claimed at most once: the claim is recorded the
//! moment a tier pairs it, so a lower tier can never re-pair it.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracksync_domain::{
    DataQualityWarning, ExplicitMapping, ExternalRecordA, ExternalRecordB, ResolverTier,
};

use crate::options::ResolverConfig;
use crate::reference::{extract_reference, normalize_title};

pub(crate) const TRACKER_A: &str = "tracker_a";
pub(crate) const TRACKER_B: &str = "tracker_b";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPair {
    pub a_record: ExternalRecordA,
    pub b_record: ExternalRecordB,
    pub tier: ResolverTier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Sorted by board record id.
    pub pairs: Vec<ResolvedPair>,
    /// Sorted by id.
    pub unmatched_a: Vec<ExternalRecordA>,
    /// Sorted by id.
    pub unmatched_b: Vec<ExternalRecordB>,
    pub warnings: Vec<DataQualityWarning>,
}

impl Resolution {
    pub fn pair_for(&self, a_id: &str) -> Option<&ResolvedPair> {
        self.pairs.iter().find(|pair| pair.a_record.id == a_id)
    }

    /// Every board record with its pairing, in id order.
    pub fn entries(&self) -> Vec<(&ExternalRecordA, Option<&ResolvedPair>)> {
        let mut entries = self
            .pairs
            .iter()
            .map(|pair| (&pair.a_record, Some(pair)))
            .chain(self.unmatched_a.iter().map(|record| (record, None)))
            .collect::<Vec<_>>();
        entries.sort_by(|left, right| left.0.id.cmp(&right.0.id));
        entries
    }
}

/// Claim bookkeeping for one run. Indices point into the sorted snapshots.
struct Claims {
    a_claims: Vec<Option<(usize, ResolverTier)>>,
    b_owner: Vec<Option<usize>>,
}

impl Claims {
    fn new(a_len: usize, b_len: usize) -> Self {
        Self {
            a_claims: vec![None; a_len],
            b_owner: vec![None; b_len],
        }
    }

    fn claim(&mut self, a_index: usize, b_index: usize, tier: ResolverTier) {
        self.a_claims[a_index] = Some((b_index, tier));
        self.b_owner[b_index] = Some(a_index);
    }
}

pub fn resolve(
    a_records: &[ExternalRecordA],
    b_records: &[ExternalRecordB],
    mappings: &[ExplicitMapping],
    config: &ResolverConfig,
) -> Resolution {
    let mut warnings = Vec::new();
    let a_sorted = dedupe_by_id(a_records, |record| &record.id, TRACKER_A, &mut warnings);
    let b_sorted = dedupe_by_id(b_records, |record| &record.id, TRACKER_B, &mut warnings);

    let a_index = a_sorted
        .iter()
        .enumerate()
        .filter(|(_, record)| !record.id.trim().is_empty())
        .map(|(index, record)| (record.id.trim(), index))
        .collect::<HashMap<_, _>>();

    let mut claims = Claims::new(a_sorted.len(), b_sorted.len());
    for tier in config.enabled_tiers() {
        match tier {
            ResolverTier::ExplicitMapping => {
                pair_explicit(&a_index, &b_sorted, mappings, &mut claims, &mut warnings)
            }
            ResolverTier::EmbeddedReference => pair_embedded(
                &a_index,
                &b_sorted,
                &config.reference_labels,
                &mut claims,
                &mut warnings,
            ),
            ResolverTier::NormalizedTitle => pair_titles(&a_sorted, &b_sorted, &mut claims),
        }
    }

    let mut resolution = Resolution {
        warnings,
        ..Resolution::default()
    };
    for (index, record) in a_sorted.iter().enumerate() {
        match claims.a_claims[index] {
            Some((b_index, tier)) => resolution.pairs.push(ResolvedPair {
                a_record: (*record).clone(),
                b_record: b_sorted[b_index].clone(),
                tier,
            }),
            None => resolution.unmatched_a.push((*record).clone()),
        }
    }
    resolution.unmatched_b = b_sorted
        .iter()
        .enumerate()
        .filter(|(index, _)| claims.b_owner[*index].is_none())
        .map(|(_, record)| (*record).clone())
        .collect();
    resolution
}

/// Sorts by id and keeps the first record seen for each non-blank id.
pub(crate) fn dedupe_by_id<'a, T>(
    records: &'a [T],
    id_of: impl Fn(&T) -> &String,
    tracker: &str,
    warnings: &mut Vec<DataQualityWarning>,
) -> Vec<&'a T> {
    let mut sorted = records.iter().collect::<Vec<_>>();
    sorted.sort_by(|left, right| id_of(left).trim().cmp(id_of(right).trim()));

    let mut kept: Vec<&T> = Vec::with_capacity(sorted.len());
    for record in sorted {
        let id = id_of(record).trim();
        let duplicate = !id.is_empty()
            && kept
                .last()
                .is_some_and(|previous| id_of(previous).trim() == id);
        if duplicate {
            warnings.push(DataQualityWarning::DuplicateRecordId {
                tracker: tracker.to_owned(),
                id: id.to_owned(),
            });
            continue;
        }
        kept.push(record);
    }
    kept
}

fn pair_explicit(
    a_index: &HashMap<&str, usize>,
    b_sorted: &[&ExternalRecordB],
    mappings: &[ExplicitMapping],
    claims: &mut Claims,
    warnings: &mut Vec<DataQualityWarning>,
) {
    let mut ordered = mappings
        .iter()
        .map(|mapping| ExplicitMapping::new(mapping.a_id.trim(), mapping.b_id.trim()))
        .filter(|mapping| !mapping.a_id.is_empty() && !mapping.b_id.is_empty())
        .collect::<Vec<_>>();
    ordered.sort();
    ordered.dedup();

    let mut kept_for_a = HashMap::<&str, &str>::new();
    for mapping in &ordered {
        let Some(&a_position) = a_index.get(mapping.a_id.as_str()) else {
            continue;
        };
        if let Some(kept_b_id) = kept_for_a.get(mapping.a_id.as_str()) {
            warnings.push(DataQualityWarning::DuplicateMappingForA {
                a_id: mapping.a_id.clone(),
                kept_b_id: (*kept_b_id).to_owned(),
                dropped_b_id: mapping.b_id.clone(),
            });
            continue;
        }

        let Some(b_position) = b_sorted
            .iter()
            .position(|record| record.answers_to(&mapping.b_id))
        else {
            warnings.push(DataQualityWarning::StaleMapping {
                a_id: mapping.a_id.clone(),
                b_id: mapping.b_id.clone(),
            });
            continue;
        };

        if let Some(owner) = claims.b_owner[b_position] {
            let kept_a_id = a_index
                .iter()
                .find(|(_, index)| **index == owner)
                .map(|(id, _)| (*id).to_owned())
                .unwrap_or_default();
            warnings.push(DataQualityWarning::DuplicateMappingForB {
                b_id: mapping.b_id.clone(),
                kept_a_id,
                dropped_a_id: mapping.a_id.clone(),
            });
            continue;
        }

        kept_for_a.insert(mapping.a_id.as_str(), mapping.b_id.as_str());
        claims.claim(a_position, b_position, ResolverTier::ExplicitMapping);
    }
}

fn pair_embedded(
    a_index: &HashMap<&str, usize>,
    b_sorted: &[&ExternalRecordB],
    labels: &[String],
    claims: &mut Claims,
    warnings: &mut Vec<DataQualityWarning>,
) {
    for (b_position, record) in b_sorted.iter().enumerate() {
        if claims.b_owner[b_position].is_some() {
            continue;
        }
        let Some(reference) = extract_reference(&record.description, labels) else {
            continue;
        };
        let Some(&a_position) = a_index.get(reference.as_str()) else {
            continue;
        };

        match claims.a_claims[a_position] {
            None => claims.claim(a_position, b_position, ResolverTier::EmbeddedReference),
            Some((kept, ResolverTier::EmbeddedReference)) => {
                warnings.push(DataQualityWarning::ContestedReference {
                    a_id: reference,
                    kept_b_id: b_sorted[kept].id.clone(),
                    dropped_b_id: record.id.clone(),
                });
            }
            Some(_) => {}
        }
    }
}

fn pair_titles(
    a_sorted: &[&ExternalRecordA],
    b_sorted: &[&ExternalRecordB],
    claims: &mut Claims,
) {
    let mut candidates = BTreeMap::<String, VecDeque<usize>>::new();
    for (b_position, record) in b_sorted.iter().enumerate() {
        if claims.b_owner[b_position].is_some() {
            continue;
        }
        let key = normalize_title(&record.summary);
        if !key.is_empty() {
            candidates.entry(key).or_default().push_back(b_position);
        }
    }

    for (a_position, record) in a_sorted.iter().enumerate() {
        if claims.a_claims[a_position].is_some() {
            continue;
        }
        let key = normalize_title(&record.title);
        if key.is_empty() {
            continue;
        }
        if let Some(b_position) = candidates.get_mut(&key).and_then(VecDeque::pop_front) {
            claims.claim(a_position, b_position, ResolverTier::NormalizedTitle);
        }
    }
}
