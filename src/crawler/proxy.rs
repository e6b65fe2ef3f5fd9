// Replacement egress proxies for the transport
use tracing::info;

/// Source of a working egress proxy, consulted when requests keep failing.
pub trait ProxyProvider: Send + Sync {
    fn next_proxy(&mut self) -> Option<String>;
}

/// Hands out a fixed list of proxies, each at most once.
pub struct ProxyPool {
    proxies: Vec<String>,
    cursor: usize,
}

impl ProxyPool {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { proxies, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.proxies.len().saturating_sub(self.cursor)
    }
}

impl ProxyProvider for ProxyPool {
    fn next_proxy(&mut self) -> Option<String> {
        let proxy = self.proxies.get(self.cursor)?.clone();
        self.cursor += 1;
        info!("Handing out replacement proxy ({} left)", self.remaining());
        Some(proxy)
    }
}
