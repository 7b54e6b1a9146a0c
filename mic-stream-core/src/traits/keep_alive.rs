use std::sync::Arc;

/// Opaque handle for an acquired wake-hold / foreground-execution guarantee.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct KeepAliveToken(u64);

impl KeepAliveToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Platform keep-alive guarantor.
pub trait KeepAliveProvider: Send + Sync {
    fn acquire(&self) -> KeepAliveToken;
    fn release(&self, token: KeepAliveToken);
}

/// Scoped keep-alive: releases its token exactly once, on drop.
pub struct KeepAliveGuard {
    provider: Arc<dyn KeepAliveProvider>,
    token: Option<KeepAliveToken>,
}

impl KeepAliveGuard {
    pub fn acquire(provider: Arc<dyn KeepAliveProvider>) -> Self {
        let token = provider.acquire();
        log::debug!("Keep-alive {} acquired", token.id());
        Self {
            provider,
            token: Some(token),
        }
    }
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            log::debug!("Keep-alive {} released", token.id());
            self.provider.release(token);
        }
    }
}
