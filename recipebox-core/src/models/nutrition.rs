use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-recipe nutrition facts. Every value is optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Nutrition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sugar: Option<f64>,
}

impl Nutrition {
    pub fn is_empty(&self) -> bool {
        self.calories.is_none()
            && self.total_fat.is_none()
            && self.total_carbs.is_none()
            && self.total_protein.is_none()
            && self.total_sugar.is_none()
    }
}

impl fmt::Display for Nutrition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            self.calories.map(|v| format!("calories: {} kcal", v)),
            self.total_fat.map(|v| format!("fat: {} g", v)),
            self.total_carbs.map(|v| format!("carbs: {} g", v)),
            self.total_protein.map(|v| format!("protein: {} g", v)),
            self.total_sugar.map(|v| format!("sugar: {} g", v)),
        ]
        .into_iter()
        .flatten()
        .collect();
        write!(f, "{}", parts.join(", "))
    }
}
