//! Merge pass: combine per-file entities and fold in declaration types.
//!
//! The same symbol can be documented in more than one file (a class and its
//! re-export, a hook and its `.tsx` wrapper). Entities are grouped by name,
//! keeping first-appearance order, and then enriched from the [`TypeIndex`].

use super::types::{ResolvedSymbol, TypeIndex};
use crate::model::*;
use std::collections::HashMap;

/// Merge entities from every file of a package, then apply `types`.
///
/// Interfaces, type aliases and enums that only exist in declaration files
/// are appended as `Type` entities.
pub fn merge(
    files: Vec<Vec<DocumentedEntity>>,
    types: &TypeIndex,
    include_internal: bool,
) -> Vec<DocumentedEntity> {
    let mut entity_map: HashMap<String, DocumentedEntity> = HashMap::new();
    let mut entity_order: Vec<String> = Vec::new();

    for entity in files.into_iter().flatten() {
        if let Some(existing) = entity_map.get_mut(&entity.name) {
            merge_entity(existing, entity);
        } else {
            entity_order.push(entity.name.clone());
            entity_map.insert(entity.name.clone(), entity);
        }
    }

    // Preserve insertion order
    let mut entities: Vec<DocumentedEntity> = entity_order
        .into_iter()
        .filter_map(|name| entity_map.remove(&name))
        .collect();

    for entity in &mut entities {
        match types.get(&entity.name) {
            Some(symbol) => apply_entity(entity, symbol),
            None if !types.is_empty() => {
                tracing::debug!(symbol = %entity.name, "no declaration found; keeping comment types")
            }
            None => {}
        }
        for member in &mut entity.members {
            match types.member(&entity.name, &member.name) {
                Some(symbol) => apply_member(member, symbol),
                None if !types.is_empty() => tracing::debug!(
                    symbol = %format!("{}.{}", entity.name, member.name),
                    "no declaration found; keeping comment types"
                ),
                None => {}
            }
        }
    }

    for (name, symbol) in types.top_level() {
        if !symbol.kind.is_type() {
            continue;
        }
        let short = name.rsplit('.').next().unwrap_or(name);
        if entities.iter().any(|e| e.name == name || e.name == short) {
            continue;
        }
        if symbol.doc.is_internal() && !include_internal {
            continue;
        }
        entities.push(type_entity(name, symbol));
    }
    entities
}

/// Fold a second sighting of the same symbol into the first.
fn merge_entity(existing: &mut DocumentedEntity, incoming: DocumentedEntity) {
    // The richer comment wins; members are unioned by name.
    if existing.doc.is_empty() && !incoming.doc.is_empty() {
        existing.doc = incoming.doc;
        existing.location = incoming.location;
        if incoming.signature.is_some() {
            existing.signature = incoming.signature;
        }
    }
    if existing.extends.is_none() {
        existing.extends = incoming.extends;
    }
    for member in incoming.members {
        if !existing
            .members
            .iter()
            .any(|m| m.name == member.name && m.is_static == member.is_static)
        {
            existing.members.push(member);
        }
    }
}

fn apply_entity(entity: &mut DocumentedEntity, symbol: &ResolvedSymbol) {
    apply_doc(&mut entity.doc, symbol, true);
    if entity.variants.is_empty() {
        entity.variants = symbol.variants.clone();
    }
    if entity.signature.is_none() {
        entity.signature = symbol.signature.clone();
    }
}

fn apply_member(member: &mut Member, symbol: &ResolvedSymbol) {
    let returns = member.kind == MemberKind::Method;
    apply_doc(&mut member.doc, symbol, returns);
    if member.kind == MemberKind::Property {
        if let Some(ref ty) = symbol.ty {
            let typed = member.signature.as_deref().is_some_and(|s| s.contains(':'));
            if !typed {
                member.signature = Some(format!("{}: {}", member.name, ty));
            }
        }
    }
}

fn bare(name: &str) -> &str {
    name.trim_start_matches("...")
}

/// Resolved types win for display; comment types stay on the model.
fn apply_doc(doc: &mut Doc, symbol: &ResolvedSymbol, returns: bool) {
    if doc.description.is_none() {
        doc.description = symbol.doc.description.clone();
    }

    // Top-level (non-dotted) documented params, for positional matching
    let top: Vec<usize> = doc
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.name.contains('.'))
        .map(|(i, _)| i)
        .collect();

    for (position, resolved) in symbol.params.iter().enumerate() {
        let by_name = doc
            .params
            .iter()
            .position(|p| bare(&p.name) == bare(&resolved.name));
        let by_position = top.get(position).copied().filter(|&i| {
            !symbol
                .params
                .iter()
                .any(|r| bare(&r.name) == bare(&doc.params[i].name))
        });
        match by_name.or(by_position) {
            Some(i) => {
                let param = &mut doc.params[i];
                if resolved.ty.is_some() {
                    param.resolved_type = resolved.ty.clone();
                }
                param.optional |= resolved.optional;
            }
            None => doc.params.push(Param {
                name: resolved.name.clone(),
                resolved_type: resolved.ty.clone(),
                optional: resolved.optional,
                ..Default::default()
            }),
        }
    }

    if returns {
        if let Some(ref ty) = symbol.returns {
            match doc.returns {
                Some(ref mut r) => r.resolved_type = Some(ty.clone()),
                None if ty != "void" => {
                    doc.returns = Some(ReturnDoc {
                        resolved_type: Some(ty.clone()),
                        ..Default::default()
                    })
                }
                None => {}
            }
        }
    }

    for generic in &symbol.generics {
        let head = generic.split_whitespace().next().unwrap_or(generic);
        let known = doc
            .type_params
            .iter()
            .any(|t| t.split_whitespace().any(|w| w == head));
        if !known {
            doc.type_params.push(generic.clone());
        }
    }
}

fn type_entity(name: &str, symbol: &ResolvedSymbol) -> DocumentedEntity {
    let mut entity = DocumentedEntity::new(name, EntityKind::Type, symbol.location.clone());
    entity.doc = symbol.doc.clone();
    for generic in &symbol.generics {
        entity.doc.type_params.push(generic.clone());
    }
    entity.signature = symbol.signature.clone();
    entity.variants = symbol.variants.clone();
    entity
}
