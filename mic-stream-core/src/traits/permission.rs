/// Outcome of a microphone permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Platform permission subsystem. The core never starts capture without `Granted`.
pub trait PermissionProvider: Send + Sync {
    /// Current permission status, without prompting.
    fn check(&self) -> PermissionStatus;

    /// Prompt the user if the platform supports it.
    fn request(&self) -> PermissionStatus;
}
