//! Resolve a slot, write its name and comment back, then read both back.

use super::{pattern, slot_check};
use crate::architectures::ArchAdapter;
use crate::error::ErrorCode;
use crate::session::Session;
use crate::types::{JtProcessResult, JumpTable, ProcessOptions, VerifyOutcome, WriteOutcome};
use tracing::{debug, info, warn};

fn push_unique(errors: &mut Vec<ErrorCode>, code: ErrorCode) {
    if !errors.contains(&code) {
        errors.push(code);
    }
}

/// Resolve `slot` and, when permitted, rename its target and comment it.
///
/// Runs in three steps. First the read-only [`slot_check`]. Then, only if
/// the slot resolved and writes are allowed, at most one rename and one
/// comment-set. Finally an independent metadata read-back that decides
/// whether the writes took effect, whatever the write calls returned.
///
/// `dry_run` stops after a read-only lookup of the current name and never
/// touches the write collaborators, even when writes are enabled.
pub fn slot_process(
    session: &mut dyn Session,
    adapter: &dyn ArchAdapter,
    table: &JumpTable,
    slot: u32,
    options: &ProcessOptions,
) -> JtProcessResult {
    let check = slot_check(&*session, adapter, table, slot);
    let mut result = JtProcessResult {
        slot: check,
        writes: WriteOutcome::default(),
        verify: VerifyOutcome::default(),
    };

    let target = match result.slot.target {
        Some(t) if t != 0 && result.slot.errors.is_empty() => t,
        _ => {
            if result.slot.errors.is_empty() {
                result.slot.errors.push(ErrorCode::NoFunctionAtTarget);
            }
            result.slot.mode = None;
            result.slot.target = None;
            return result;
        }
    };

    if options.dry_run {
        if let Some(info) = session.get_function_by_address(target) {
            result.verify.comment_present = info.comment.as_deref().is_some_and(|c| !c.is_empty());
            result.verify.name = Some(info.name);
        }
        if let Ok(name) = pattern::render(&options.rename_pattern, slot, target) {
            result.slot.notes.push(format!("dry run: would rename to {}", name));
        }
        debug!(slot, "dry run, no writes");
        return result;
    }

    if !options.writes_enabled {
        result.slot.errors.push(ErrorCode::WriteDisabledDryRun);
        return result;
    }

    let rendered = pattern::render(&options.rename_pattern, slot, target).and_then(|name| {
        pattern::render(&options.comment_pattern, slot, target).map(|comment| (name, comment))
    });
    let (name, comment) = match rendered {
        Ok(pair) => pair,
        Err(e) => {
            warn!(slot, error = %e, "pattern rejected");
            result.slot.errors.push(e);
            return result;
        }
    };

    result.writes.renamed = session.rename_function(target, &name);
    if !result.writes.renamed {
        push_unique(&mut result.slot.errors, ErrorCode::WriteVerifyFailed);
    }
    result.writes.comment_set = session.set_decompiler_comment(target, &comment);
    if !result.writes.comment_set {
        push_unique(&mut result.slot.errors, ErrorCode::WriteVerifyFailed);
    }
    info!(
        slot,
        target = format_args!("0x{:X}", target),
        renamed = result.writes.renamed,
        comment_set = result.writes.comment_set,
        "slot written"
    );

    match session.get_function_by_address(target) {
        Some(info) => {
            result.verify.comment_present =
                info.comment.as_deref().is_some_and(|c| c.contains(&comment));
            if result.writes.renamed && info.name != name {
                result
                    .slot
                    .notes
                    .push(format!("read-back name {:?} does not match {:?}", info.name, name));
                push_unique(&mut result.slot.errors, ErrorCode::WriteVerifyFailed);
            }
            if result.writes.comment_set && !result.verify.comment_present {
                result.slot.notes.push(String::from("read-back comment missing"));
                push_unique(&mut result.slot.errors, ErrorCode::WriteVerifyFailed);
            }
            result.verify.name = Some(info.name);
        }
        None => {
            result
                .slot
                .notes
                .push(String::from("function metadata missing after write"));
            push_unique(&mut result.slot.errors, ErrorCode::WriteVerifyFailed);
        }
    }

    result
}
