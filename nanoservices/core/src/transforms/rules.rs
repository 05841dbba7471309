use serde_json::Value;

/// Field validation rules, looked up by the name used in dataflow documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Present and not the null literal.
    NotNull,
    /// Present, not null, not `""` and not `[]`.
    NotEmpty,
}

impl Rule {
    pub const ALL: [Rule; 2] = [Rule::NotNull, Rule::NotEmpty];

    pub fn from_name(name: &str) -> Option<Rule> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Rule::NotNull => "notNull",
            Rule::NotEmpty => "notEmpty",
        }
    }

    /// `notEmpty` -> `NOT_EMPTY`
    pub fn error_code(self) -> &'static str {
        match self {
            Rule::NotNull => "NOT_NULL",
            Rule::NotEmpty => "NOT_EMPTY",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Rule::NotNull => "Field cannot be null",
            Rule::NotEmpty => "Field cannot be empty",
        }
    }

    /// Evaluate the rule against a field value. `None` means the field is
    /// absent, which fails every rule.
    pub fn check(self, value: Option<&Value>) -> bool {
        match (self, value) {
            (_, None) | (_, Some(Value::Null)) => false,
            (Rule::NotNull, Some(_)) => true,
            (Rule::NotEmpty, Some(Value::String(s))) => !s.is_empty(),
            (Rule::NotEmpty, Some(Value::Array(items))) => !items.is_empty(),
            (Rule::NotEmpty, Some(_)) => true,
        }
    }
}

/// Names accepted in `validations` lists, in declaration order.
pub fn available() -> Vec<&'static str> {
    Rule::ALL.iter().map(|r| r.name()).collect()
}
