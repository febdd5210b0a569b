use crate::recorder::check_host_prerequisites;

use std::io::Write;

use tempfile::NamedTempFile;

fn sysctl(value: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{value}").unwrap();
    file
}

/// WHAT: An enabled sysctl passes
/// WHY: The browser sandbox needs unprivileged user namespaces
#[test]
fn given_enabled_sysctl_when_checking_prerequisites_then_ok() {
    // Given
    let file = sysctl("1");

    // When / Then
    assert!(check_host_prerequisites(file.path()).is_ok());
}

/// WHAT: A disabled sysctl fails the check
/// WHY: Chromium would crash later with a far less clear error
#[cfg(target_os = "linux")]
#[test]
fn given_disabled_sysctl_when_checking_prerequisites_then_prerequisite_error() {
    // Given
    let file = sysctl("0");

    // When
    let result = check_host_prerequisites(file.path());

    // Then
    assert!(matches!(result, Err(crate::RecorderError::Prerequisite { .. })));
}

/// WHAT: An unreadable sysctl only warns
/// WHY: Newer kernels drop the knob and allow namespaces by default
#[test]
fn given_missing_sysctl_when_checking_prerequisites_then_ok() {
    // Given
    let dir = tempfile::tempdir().unwrap();

    // When / Then
    assert!(check_host_prerequisites(&dir.path().join("absent")).is_ok());
}
