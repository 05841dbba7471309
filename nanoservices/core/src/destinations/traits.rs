use async_trait::async_trait;
use std::path::PathBuf;
use etlflow_utils::{Dataset, EtlResult};

/// A data destination that loads a dataset and declares what it consumes.
#[async_trait]
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    /// The named dataset this destination requires
    fn consumes(&self) -> &str;

    /// Load data to the destination, returning every location written
    async fn load(&self, data: &Dataset) -> EtlResult<Vec<PathBuf>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use etlflow_utils::{Fields, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDestination {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Destination for CountingDestination {
        fn name(&self) -> &str { "counter" }
        fn consumes(&self) -> &str { "input_data" }
        async fn load(&self, data: &Dataset) -> EtlResult<Vec<PathBuf>> {
            self.count.fetch_add(data.len(), Ordering::SeqCst);
            Ok(vec![PathBuf::from("memory")])
        }
    }

    #[tokio::test]
    async fn destination_trait_works() {
        let dest = CountingDestination { count: AtomicUsize::new(0) };
        assert_eq!(dest.name(), "counter");
        assert_eq!(dest.consumes(), "input_data");

        let data: Dataset = (0..3).map(|i| Record::new(i.to_string(), "in.json", Fields::new())).collect();
        let written = dest.load(&data).await.unwrap();
        assert_eq!(written, vec![PathBuf::from("memory")]);
        assert_eq!(dest.count.load(Ordering::SeqCst), 3);
    }
}
