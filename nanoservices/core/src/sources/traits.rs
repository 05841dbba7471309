use async_trait::async_trait;
use etlflow_utils::{Dataset, EtlResult};

/// A data source that extracts records and declares the dataset it seeds.
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable name for logging and metrics
    fn name(&self) -> &str;

    /// The named dataset this source seeds
    fn produces(&self) -> &str;

    /// Extract every record the source currently holds
    async fn extract(&self) -> EtlResult<Dataset>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use etlflow_utils::{Fields, Record};

    struct TestSource;

    #[async_trait]
    impl Source for TestSource {
        fn name(&self) -> &str { "test_source" }
        fn produces(&self) -> &str { "test_data" }
        async fn extract(&self) -> EtlResult<Dataset> {
            Ok((1..=3).map(|i| Record::new(i.to_string(), "memory", Fields::new())).collect())
        }
    }

    #[tokio::test]
    async fn source_trait_works() {
        let src = TestSource;
        assert_eq!(src.name(), "test_source");
        assert_eq!(src.produces(), "test_data");
        let data = src.extract().await.unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.records()[2].id(), "3");
    }
}
