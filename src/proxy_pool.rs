use rand::seq::SliceRandom;

/// Outbound proxies; one is drawn at random for every upstream operation.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    endpoints: Vec<String>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<String>) -> Self {
        let endpoints = endpoints
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { endpoints }
    }

    /// Empty pool means direct connections.
    pub fn pick(&self) -> Option<&str> {
        self.endpoints
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
