use async_trait::async_trait;
use etlflow_utils::{Dataset, EtlResult};

use crate::config::model::{FieldAddition, ADD_FIELDS};
use crate::transforms::traits::{StageContext, StageOutput, Transform};

/// Writes computed fields onto a copy of every record. Additions run in
/// declared order, so later ones see earlier writes.
pub struct AddFields {
    name: String,
    input: String,
    additions: Vec<FieldAddition>,
}

impl AddFields {
    pub fn new(name: impl Into<String>, input: impl Into<String>, additions: Vec<FieldAddition>) -> Self {
        Self { name: name.into(), input: input.into(), additions }
    }
}

#[async_trait]
impl Transform for AddFields {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        ADD_FIELDS
    }

    fn consumes(&self) -> &str {
        &self.input
    }

    fn produces(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    async fn transform(&self, _ctx: &StageContext, input: Dataset) -> EtlResult<StageOutput> {
        let output: Dataset = input
            .iter()
            .map(|record| {
                let mut enriched = record.clone();
                for addition in &self.additions {
                    enriched.set(addition.field.as_str(), addition.function.apply(&addition.args));
                }
                enriched.push_step(ADD_FIELDS);
                enriched.push_step(self.name.as_str());
                enriched
            })
            .collect();

        Ok(StageOutput::single(self.name.clone(), output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::functions::{FieldFunction, TIMESTAMP_FORMAT};
    use etlflow_utils::{Fields, Record};
    use serde_json::{json, Map, Value};

    fn ctx() -> StageContext {
        StageContext { execution_id: "exec-1".into(), dataflow: "people".into() }
    }

    fn records(n: usize) -> Dataset {
        (0..n)
            .map(|i| {
                let mut r = Record::new(i.to_string(), "in.json", Fields::new());
                r.set("n", json!(i));
                r
            })
            .collect()
    }

    fn addition(field: &str, function: FieldFunction, args: Map<String, Value>) -> FieldAddition {
        FieldAddition { field: field.into(), function, args }
    }

    #[tokio::test]
    async fn timestamps_every_record_in_order() {
        let stage = AddFields::new(
            "ok_with_date",
            "validation_ok",
            vec![addition("dt", FieldFunction::CurrentTimestamp, Map::new())],
        );
        let out = stage.transform(&ctx(), records(3)).await.unwrap();
        let (name, data) = &out.datasets[0];
        assert_eq!(name, "ok_with_date");
        assert_eq!(data.len(), 3);

        let stamps: Vec<chrono::NaiveDateTime> = data
            .iter()
            .map(|r| {
                let ts = r.get("dt").and_then(Value::as_str).unwrap();
                chrono::NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap()
            })
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn later_additions_overwrite_earlier_ones() {
        let mut first = Map::new();
        first.insert("value".into(), json!("a"));
        let mut second = Map::new();
        second.insert("value".into(), json!("b"));
        let stage = AddFields::new(
            "tagged",
            "raw",
            vec![
                addition("tag", FieldFunction::Literal, first),
                addition("id_copy", FieldFunction::Uuid, Map::new()),
                addition("tag", FieldFunction::Literal, second),
            ],
        );

        let input = records(2);
        let out = stage.transform(&ctx(), input.clone()).await.unwrap();
        let data = &out.datasets[0].1;
        assert!(data.iter().all(|r| r.get("tag") == Some(&json!("b"))));
        assert_ne!(data.records()[0].get("id_copy"), data.records()[1].get("id_copy"));
        assert_eq!(data.records()[0].trail().last().map(String::as_str), Some("tagged"));

        // the input keeps its original fields
        assert!(input.iter().all(|r| r.get("tag").is_none()));
    }

    #[tokio::test]
    async fn empty_input_gives_empty_output() {
        let stage = AddFields::new("x", "raw", vec![addition("u", FieldFunction::Uuid, Map::new())]);
        let out = stage.transform(&ctx(), Dataset::default()).await.unwrap();
        assert!(out.datasets[0].1.is_empty());
    }
}
