//! Comparison of two promotion snapshots.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::model::ChangeSet;
use crate::model::Promotion;

/// Computes what changed between the `old` and `new` snapshot of one source.
///
/// Promotions are only matched against peers of the same type, since
/// sources reuse ids across promotion types. `changed` carries the new
/// version of each promotion. Groups appear in the order their type is
/// first seen in `new`, then in `old`.
pub fn diff(old: &[Promotion], new: &[Promotion]) -> ChangeSet {
    let old_groups = group_by_kind(old);
    let new_groups = group_by_kind(new);

    let mut kinds: Vec<&str> = Vec::new();
    for promo in new.iter().chain(old) {
        if !kinds.contains(&promo.kind.as_str()) {
            kinds.push(&promo.kind);
        }
    }

    let mut changes = ChangeSet::default();
    for kind in kinds {
        let old_group = old_groups.get(kind).map(Vec::as_slice).unwrap_or_default();
        let new_group = new_groups.get(kind).map(Vec::as_slice).unwrap_or_default();
        diff_group(old_group, new_group, &mut changes);
    }
    changes
}

fn group_by_kind(promotions: &[Promotion]) -> HashMap<&str, Vec<&Promotion>> {
    let mut groups: HashMap<&str, Vec<&Promotion>> = HashMap::new();
    for promo in promotions {
        groups.entry(promo.kind.as_str()).or_default().push(promo);
    }
    groups
}

fn diff_group(old: &[&Promotion], new: &[&Promotion], changes: &mut ChangeSet) {
    // first occurrence wins on both sides
    let mut old_by_id: HashMap<&str, &Promotion> = HashMap::new();
    for promo in old {
        old_by_id.entry(promo.id.as_str()).or_insert(*promo);
    }
    let new_ids: HashSet<&str> = new.iter().map(|promo| promo.id.as_str()).collect();

    let mut seen = HashSet::new();
    for promo in new {
        if !seen.insert(promo.id.as_str()) {
            continue;
        }
        match old_by_id.get(promo.id.as_str()) {
            None => changes.new.push((*promo).clone()),
            Some(previous) if differs(previous, promo) => changes.changed.push((*promo).clone()),
            Some(_) => {}
        }
    }

    let mut seen = HashSet::new();
    for promo in old {
        if !new_ids.contains(promo.id.as_str()) && seen.insert(promo.id.as_str()) {
            changes.ended.push((*promo).clone());
        }
    }
}

fn differs(old: &Promotion, new: &Promotion) -> bool {
    old.title != new.title
        || old.kind != new.kind
        || old.product_count != new.product_count
        || old.start_date != new.start_date
        || old.end_date != new.end_date
        || old.products.len() != new.products.len()
}
