//! The boot-time privilege-separation sequence (§5 "Privilege lifecycle"):
//! chroot, then setgid/setuid, then the CGI CPU rlimit default, refusing to
//! continue if root privileges somehow survive the drop.
//!
//! None of this runs on non-Unix targets; `--jail` is simply ignored there.
//! Grounded on the distilled spec's unchanged §6 "Virtual hosting" note that
//! this sequencing (chroot before setuid, rlimit after chroot) is load-
//! bearing and must not be reordered.

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("chroot to {path} failed: {source}")]
    Chroot { path: String, source: std::io::Error },
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("failed to drop privileges: {0}")]
    DropPrivileges(std::io::Error),
    #[error("process still has root privileges after startup")]
    StillRoot,
}

#[cfg(unix)]
pub fn enter_jail(root: &std::path::Path, user: Option<&str>) -> Result<(), BootError> {
    use nix::unistd;

    if !unistd::getuid().is_root() {
        return Ok(());
    }

    unistd::chroot(root).map_err(|errno| BootError::Chroot {
        path: root.display().to_string(),
        source: std::io::Error::from_raw_os_error(errno as i32),
    })?;
    std::env::set_current_dir("/").map_err(BootError::DropPrivileges)?;

    if let Some(user) = user {
        let passwd = unistd::User::from_name(user)
            .map_err(|errno| BootError::DropPrivileges(std::io::Error::from_raw_os_error(errno as i32)))?
            .ok_or_else(|| BootError::UnknownUser(user.to_string()))?;

        unistd::setgid(passwd.gid)
            .map_err(|errno| BootError::DropPrivileges(std::io::Error::from_raw_os_error(errno as i32)))?;
        unistd::setuid(passwd.uid)
            .map_err(|errno| BootError::DropPrivileges(std::io::Error::from_raw_os_error(errno as i32)))?;
    }

    if unistd::getuid().is_root() {
        return Err(BootError::StillRoot);
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn enter_jail(_root: &std::path::Path, _user: Option<&str>) -> Result<(), BootError> {
    Ok(())
}

/// Installs the default CGI CPU rlimit for the server process's own
/// descendants (belt-and-suspenders; the per-child limit installed in
/// `althttpd-cgi::cgi::spawn`'s `pre_exec` is what actually matters, since
/// `RLIMIT_CPU` is inherited across `fork`/`exec` but explicit is better
/// than implicit here).
#[cfg(unix)]
pub fn install_default_cpu_rlimit(max_cpu_secs: u64) -> Result<(), BootError> {
    if max_cpu_secs == 0 {
        return Ok(());
    }
    nix::sys::resource::setrlimit(nix::sys::resource::Resource::RLIMIT_CPU, max_cpu_secs, max_cpu_secs)
        .map_err(|errno| BootError::DropPrivileges(std::io::Error::from_raw_os_error(errno as i32)))
}

#[cfg(not(unix))]
pub fn install_default_cpu_rlimit(_max_cpu_secs: u64) -> Result<(), BootError> {
    Ok(())
}
