//! Label Encoder Module
//! Maps categorical strings seen at training time to integer codes.

use crate::data::columns::{CATEGORY, MODE, POWERTRAIN, REGION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Categorical inputs of the forecast model, in feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoricalField {
    Region,
    Mode,
    Powertrain,
    Category,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 4] = [
        CategoricalField::Region,
        CategoricalField::Mode,
        CategoricalField::Powertrain,
        CategoricalField::Category,
    ];

    /// Dataset column the field is read from.
    pub fn column(self) -> &'static str {
        match self {
            CategoricalField::Region => REGION,
            CategoricalField::Mode => MODE,
            CategoricalField::Powertrain => POWERTRAIN,
            CategoricalField::Category => CATEGORY,
        }
    }
}

/// Bijection between the distinct training values of one field and `0..k`.
///
/// Classes are kept sorted, so codes follow lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Code of `value`, or `None` if it was not seen during fitting.
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Fitted classes must be strictly ascending for lookups to work.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }
}

/// Encode `raw_value` for `field`, falling back to code 0 for values that were
/// never seen during training.
pub fn encode_categorical(field: CategoricalField, raw_value: &str, encoder: &LabelEncoder) -> usize {
    let value = raw_value.trim();
    match encoder.transform(value) {
        Some(code) => code,
        None => {
            debug!(field = field.column(), value, "Unseen category, using fallback code 0");
            0
        }
    }
}
