use async_trait::async_trait;
use etlflow_utils::{Dataset, EtlResult, FieldFailure};

use crate::config::model::{ko_name, ok_name, FieldRules, VALIDATE_FIELDS};
use crate::events::types::ValidationErrorFact;
use crate::transforms::traits::{StageContext, StageOutput, Transform};

/// Splits a dataset into `<name>_ok` and `<name>_ko`.
///
/// Every declared (field, rule) pair is checked for every record; nothing
/// short-circuits. A record lands in `_ok` only if all pairs pass. Both
/// branches keep input order.
pub struct ValidateFields {
    name: String,
    input: String,
    fields: Vec<FieldRules>,
}

impl ValidateFields {
    pub fn new(name: impl Into<String>, input: impl Into<String>, fields: Vec<FieldRules>) -> Self {
        Self { name: name.into(), input: input.into(), fields }
    }
}

#[async_trait]
impl Transform for ValidateFields {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        VALIDATE_FIELDS
    }

    fn consumes(&self) -> &str {
        &self.input
    }

    fn produces(&self) -> Vec<String> {
        vec![ok_name(&self.name), ko_name(&self.name)]
    }

    async fn transform(&self, ctx: &StageContext, input: Dataset) -> EtlResult<StageOutput> {
        let ok_branch = ok_name(&self.name);
        let ko_branch = ko_name(&self.name);
        let mut ok = Vec::new();
        let mut ko = Vec::new();
        let mut errors = Vec::new();

        for record in input.iter() {
            let mut failures = Vec::new();
            for rules in &self.fields {
                let value = record.get(&rules.field);
                for rule in &rules.rules {
                    if !rule.check(value) {
                        failures.push((rules.field.as_str(), *rule));
                    }
                }
            }

            let mut routed = record.clone();
            routed.push_step(VALIDATE_FIELDS);
            if failures.is_empty() {
                routed.set_failures(Vec::new());
                routed.push_step(ok_branch.as_str());
                ok.push(routed);
            } else {
                for (field, rule) in &failures {
                    errors.push(ValidationErrorFact::new(&ctx.execution_id, &self.name, record, field, *rule));
                }
                routed.set_failures(
                    failures
                        .iter()
                        .map(|(field, rule)| FieldFailure { field: field.to_string(), rule: rule.name().to_string() })
                        .collect(),
                );
                routed.push_step(ko_branch.as_str());
                ko.push(routed);
            }
        }

        tracing::debug!(
            stage = %self.name,
            input = input.len(),
            ok = ok.len(),
            ko = ko.len(),
            "validation split"
        );

        Ok(StageOutput {
            datasets: vec![(ok_branch, Dataset::new(ok)), (ko_branch, Dataset::new(ko))],
            errors,
        })
    }
}
