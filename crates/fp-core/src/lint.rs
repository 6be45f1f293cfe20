//! Lint diagnostics for flow documents.
//!
//! Reports structural issues without modifying the document. Runs on the
//! raw [`FlowDocument`] so that problems the importer silently repairs
//! (duplicate ids, dangling connectors) are still visible.

use crate::codec::FlowDocument;
use crate::id::NodeId;
use std::collections::{HashMap, HashSet};

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Data is lost or repaired on import.
    Warning,
    /// Cosmetic or legacy, handled transparently.
    Info,
}

/// A single lint diagnostic for a node or connector.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    /// The node or connector this diagnostic refers to.
    pub node_id: NodeId,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-parent").
    pub rule: &'static str,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over the document and return diagnostics.
#[must_use]
pub fn lint_document(doc: &FlowDocument) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_duplicate_ids(doc, &mut diags);
    lint_parents(doc, &mut diags);
    lint_parent_cycles(doc, &mut diags);
    lint_group_order(doc, &mut diags);
    lint_connectors(doc, &mut diags);
    lint_duplicate_names(doc, &mut diags);
    diags
}

fn warn(diags: &mut Vec<LintDiagnostic>, id: &str, rule: &'static str, message: String) {
    diags.push(LintDiagnostic {
        node_id: NodeId::intern(id),
        message,
        severity: LintSeverity::Warning,
        rule,
    });
}

fn info(diags: &mut Vec<LintDiagnostic>, id: &str, rule: &'static str, message: String) {
    diags.push(LintDiagnostic {
        node_id: NodeId::intern(id),
        message,
        severity: LintSeverity::Info,
        rule,
    });
}

// ─── Rules ────────────────────────────────────────────────────────────────

fn lint_duplicate_ids(doc: &FlowDocument, diags: &mut Vec<LintDiagnostic>) {
    let mut seen = HashSet::new();
    for rec in &doc.nodes {
        if !seen.insert(rec.id.as_str()) {
            warn(
                diags,
                &rec.id,
                "duplicate-id",
                format!("Node id `{}` is used more than once; only the first is loaded.", rec.id),
            );
        }
    }
    let mut seen = HashSet::new();
    for rec in &doc.connectors {
        if !seen.insert(rec.id.as_str()) {
            warn(
                diags,
                &rec.id,
                "duplicate-id",
                format!("Connector id `{}` is used more than once.", rec.id),
            );
        }
    }
}

/// Parent references must name an existing group.
fn lint_parents(doc: &FlowDocument, diags: &mut Vec<LintDiagnostic>) {
    let kinds: HashMap<&str, &str> = doc
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.kind.as_str()))
        .collect();
    for rec in &doc.nodes {
        let Some(parent) = rec.parent_id.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };
        match kinds.get(parent) {
            None => warn(
                diags,
                &rec.id,
                "dangling-parent",
                format!("`{}` names missing parent `{parent}`; it will be detached.", rec.id),
            ),
            Some(&kind) if kind != "group" => warn(
                diags,
                &rec.id,
                "non-group-parent",
                format!("`{}` is parented to `{parent}`, which is a {kind}, not a group.", rec.id),
            ),
            Some(_) if parent == rec.id => warn(
                diags,
                &rec.id,
                "parent-cycle",
                format!("`{}` is its own parent.", rec.id),
            ),
            Some(_) => {}
        }
    }
}

fn lint_parent_cycles(doc: &FlowDocument, diags: &mut Vec<LintDiagnostic>) {
    let parent_of: HashMap<&str, &str> = doc
        .nodes
        .iter()
        .filter_map(|n| Some((n.id.as_str(), n.parent_id.as_deref()?)))
        .filter(|(id, p)| id != p)
        .collect();
    for rec in &doc.nodes {
        let mut cursor = parent_of.get(rec.id.as_str()).copied();
        let mut steps = 0;
        while let Some(p) = cursor {
            if p == rec.id {
                warn(
                    diags,
                    &rec.id,
                    "parent-cycle",
                    format!("`{}` is nested inside itself through its parents.", rec.id),
                );
                break;
            }
            steps += 1;
            if steps > parent_of.len() {
                break;
            }
            cursor = parent_of.get(p).copied();
        }
    }
}

/// A group listed after one of its children renders behind it.
fn lint_group_order(doc: &FlowDocument, diags: &mut Vec<LintDiagnostic>) {
    let position: HashMap<&str, usize> = doc
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();
    for (i, rec) in doc.nodes.iter().enumerate() {
        let Some(parent) = rec.parent_id.as_deref() else {
            continue;
        };
        if position.get(parent).is_some_and(|&p| p > i) {
            info(
                diags,
                parent,
                "group-order",
                format!(
                    "Group `{parent}` appears after its child `{}`; it will be moved first.",
                    rec.id
                ),
            );
        }
    }
}

fn lint_connectors(doc: &FlowDocument, diags: &mut Vec<LintDiagnostic>) {
    let ids: HashSet<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
    for rec in &doc.connectors {
        for endpoint in [&rec.source_id, &rec.target_id] {
            if !ids.contains(endpoint.as_str()) {
                warn(
                    diags,
                    &rec.id,
                    "dangling-connector",
                    format!(
                        "Connector `{}` references missing node `{endpoint}`; it will be dropped.",
                        rec.id
                    ),
                );
            }
        }
        let legacy = |h: &Option<String>| h.as_deref() == Some("top");
        if legacy(&rec.source_handle) || legacy(&rec.target_handle) {
            info(
                diags,
                &rec.id,
                "legacy-handle",
                format!("Connector `{}` uses the legacy `top` handle id.", rec.id),
            );
        }
    }
}

fn lint_duplicate_names(doc: &FlowDocument, diags: &mut Vec<LintDiagnostic>) {
    let mut seen = HashSet::new();
    for rec in &doc.nodes {
        let name = rec.label.as_deref().filter(|l| !l.is_empty()).unwrap_or(&rec.name);
        if !name.is_empty() && !seen.insert(name) {
            info(
                diags,
                &rec.id,
                "duplicate-name",
                format!("Another node is already named `{name}`."),
            );
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
