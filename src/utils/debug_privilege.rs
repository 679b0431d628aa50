use crate::{
    error::{Error, Result},
    kernel::{
        Kernel, TokenAccess,
        constants::{SE_DEBUG_NAME, STATUS_NO_SUCH_PRIVILEGE, STATUS_SUCCESS},
    },
    utils::SafeHandle,
};

/// Sets the state of SeDebugPrivilege for the current process.
fn set_debug_privilege<K: Kernel + ?Sized>(kernel: &K, enable: bool) -> Result<()> {
    let token = SafeHandle::open_process_token(
        kernel,
        TokenAccess::ADJUST_PRIVILEGES | TokenAccess::QUERY,
    )?;

    let luid = kernel
        .lookup_privilege_value(SE_DEBUG_NAME)
        .ok_or(Error::NtStatus(STATUS_NO_SUCH_PRIVILEGE))?;

    // STATUS_NOT_ALL_ASSIGNED is a success code, but the privilege
    // was not actually granted
    match kernel.adjust_token_privileges(*token, luid, enable) {
        STATUS_SUCCESS => Ok(()),
        status => Err(Error::NtStatus(status)),
    }
}

/// Enables SeDebugPrivilege for the current process.
///
/// Returns `false` if the token could not be adjusted, typically because the
/// process is not elevated. Callers keep going without it: protected
/// processes then simply refuse to be opened.
pub fn enable_debug_privilege<K: Kernel + ?Sized>(kernel: &K) -> bool {
    match set_debug_privilege(kernel, true) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "SeDebugPrivilege not enabled");
            false
        }
    }
}
