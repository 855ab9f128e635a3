use serde::Deserialize;

/// Knobs for connection and coupling-coefficient construction.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GugaConfig {
    /// Connections whose bridge or left configuration has fewer open shells than
    /// this are dropped.
    pub min_nue: usize,
    /// Worker threads per process. Defaults to the size of the rayon pool (or 1
    /// without the `rayon` feature).
    pub threads: Option<usize>,
    /// Rank of this process among `process_count` cooperating processes
    pub process_rank: usize,
    pub process_count: usize,
}

impl Default for GugaConfig {
    fn default() -> Self {
        Self {
            min_nue: 0,
            threads: None,
            process_rank: 0,
            process_count: 1,
        }
    }
}

impl GugaConfig {
    pub fn thread_count(&self) -> usize {
        #[cfg(feature = "rayon")]
        let default = rayon::current_num_threads();
        #[cfg(not(feature = "rayon"))]
        let default = 1;

        self.threads.unwrap_or(default).max(1)
    }
}
