use ordering::{EditCommand, Item, OrderingProfile, ValidationGate};
use serde::Deserialize;
use serde_json::Value;

/// Scripted edit session replayed by `order-editor replay`
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub container: String,
    #[serde(default)]
    pub profile: OrderingProfile,
    /// Seed for the in-memory remote; ignored against a live server
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub commands: Vec<EditCommand>,
    #[serde(default)]
    pub save: bool,
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Owning record checked by the required fields
    #[serde(default)]
    pub record: Value,
}

impl Script {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn gate(&self) -> ValidationGate<Value> {
        self.required_fields
            .iter()
            .fold(ValidationGate::new(self.profile), |gate, field| {
                let name = field.clone();
                gate.require(field.clone(), move |record: &Value| {
                    field_present(record.get(&name))
                })
            })
    }
}

/// Null and empty strings count as missing.
fn field_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
