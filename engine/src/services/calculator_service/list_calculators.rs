// Handler listing the registered calculators
use serde::Serialize;

use crate::calculators::CalculatorRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculatorInfo {
    pub name: String,
    pub description: String,
}

pub fn handle_list(registry: &CalculatorRegistry) -> Vec<CalculatorInfo> {
    let mut infos: Vec<CalculatorInfo> = registry
        .iter()
        .map(|c| CalculatorInfo {
            name: c.name().to_string(),
            description: c.description().to_string(),
        })
        .collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    infos
}
