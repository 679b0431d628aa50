use crate::{
    Result,
    iter::{HandleSnapshot, SnapshotConfig},
    kernel::{DuplicateOptions, Kernel, ProcessAccess},
    object::{NameMatcher, resolve_name},
    utils::SafeHandle,
};

fn close_first_match<K: Kernel + ?Sized>(
    kernel: &K,
    config: &SnapshotConfig,
    pid: u32,
    matcher: &NameMatcher,
) -> Result<bool> {
    let process = SafeHandle::open_process(
        kernel,
        pid,
        ProcessAccess::DUP_HANDLE | ProcessAccess::QUERY_LIMITED_INFORMATION,
    )?;
    let snapshot = HandleSnapshot::capture(kernel, config)?;

    for entry in snapshot.table().owned_by(pid) {
        let Some(name) = resolve_name(kernel, *process, entry.handle) else {
            continue;
        };

        if !matcher.matches(&name) {
            continue;
        }

        // duplicating with CLOSE_SOURCE is what closes the handle in the
        // target; the local copy is dropped straight away
        match SafeHandle::duplicate(kernel, *process, entry.handle, DuplicateOptions::CLOSE_SOURCE) {
            Ok(_local) => {
                tracing::info!(pid, handle = entry.handle, name = name.trim(), "closed handle");
                return Ok(true);
            }
            Err(err) => {
                tracing::debug!(pid, handle = entry.handle, error = %err, "failed to close handle");
            }
        }
    }

    Ok(false)
}

/// Closes the first handle owned by `pid` whose object name satisfies `matcher`.
///
/// At most one handle is closed per call. Returns `false` when the process
/// cannot be opened, the handle table cannot be read, nothing matched, or
/// every matching handle refused to be closed.
pub fn try_close_matching_handle<K: Kernel + ?Sized>(
    kernel: &K,
    config: &SnapshotConfig,
    pid: u32,
    matcher: &NameMatcher,
) -> bool {
    match close_first_match(kernel, config, pid, matcher) {
        Ok(closed) => closed,
        Err(err) => {
            tracing::debug!(pid, error = %err, "handle scan skipped");
            false
        }
    }
}

/// Resolves every named handle owned by `pid` without closing anything.
///
/// Names are trimmed, blank ones dropped, duplicates removed, and the result
/// sorted. A process that cannot be opened yields an empty list.
pub fn collect_handle_names<K: Kernel + ?Sized>(
    kernel: &K,
    config: &SnapshotConfig,
    pid: u32,
) -> Vec<String> {
    let collect = || -> Result<Vec<String>> {
        let process = SafeHandle::open_process(
            kernel,
            pid,
            ProcessAccess::DUP_HANDLE | ProcessAccess::QUERY_LIMITED_INFORMATION,
        )?;
        let snapshot = HandleSnapshot::capture(kernel, config)?;

        let mut names = Vec::new();
        snapshot.table().for_each_entry(pid, |entry| {
            if let Some(name) = resolve_name(kernel, *process, entry.handle) {
                let name = name.trim();
                if !name.is_empty() {
                    names.push(name.to_owned());
                }
            }
        });
        Ok(names)
    };

    let mut names = collect().unwrap_or_else(|err| {
        tracing::debug!(pid, error = %err, "handle listing failed");
        Vec::new()
    });
    names.sort();
    names.dedup();
    names
}
