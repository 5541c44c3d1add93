use std::collections::HashMap;

use log::*;

use crate::label::LABEL_AGGREGATE_PREFIX;
use crate::label_config::{Dimension, LabelConfig};

/// What an aggregation property refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AggregateBy<'a> {
    // "label:<key>", the key is used as is
    Label(&'a str),
    Dimension(Dimension),
    Unrecognized,
}

impl<'a> AggregateBy<'a> {
    pub fn parse(aggregate_by: &'a str) -> Self {
        if let Some(key) = aggregate_by.strip_prefix(LABEL_AGGREGATE_PREFIX) {
            return AggregateBy::Label(key);
        }

        match aggregate_by.parse::<Dimension>() {
            Ok(dim) => AggregateBy::Dimension(dim),
            Err(_) => AggregateBy::Unrecognized,
        }
    }
}

/// Derives an external allocation name from a set of labels.
///
/// When aggregating by a label (e.g. `label:app`) the value under that key is
/// returned as `app=<value>`. When aggregating by a Kubernetes concept (e.g.
/// `namespace`) the external label configured for it is looked up and its bare
/// value is returned. An absent config behaves like one holding only defaults.
///
/// Returns an empty string when the property is not recognized or the label is
/// not present; callers must treat that as "no value".
pub fn external_allocation_name(
    lc: Option<&LabelConfig>,
    labels: &HashMap<String, String>,
    aggregate_by: &str,
) -> String {
    let (label_name, by_label) = match AggregateBy::parse(aggregate_by) {
        AggregateBy::Label(key) => (key.to_string(), true),
        AggregateBy::Dimension(dim) => {
            let slot = dim.external_slot();
            let name = match lc {
                Some(lc) => lc.resolve(slot),
                None => slot.default_value().to_string(),
            };
            (name, false)
        }
        AggregateBy::Unrecognized => {
            trace!("No external label for '{aggregate_by}'");
            return String::new();
        }
    };

    // "label:" with nothing after it
    if label_name.is_empty() {
        trace!("No label key in '{aggregate_by}'");
        return String::new();
    }

    let Some(value) = labels.get(&label_name) else {
        trace!("Label '{label_name}' not present for '{aggregate_by}'");
        return String::new();
    };

    if by_label {
        format!("{label_name}={value}")
    } else {
        value.clone()
    }
}

impl LabelConfig {
    pub fn external_allocation_name(
        &self,
        labels: &HashMap<String, String>,
        aggregate_by: &str,
    ) -> String {
        external_allocation_name(Some(self), labels, aggregate_by)
    }
}
