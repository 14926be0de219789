//! Label and annotation patches applied in bulk by `label` and `annotate`.

use crate::pool::Task;
use crate::registry::{Labeled, Metadata, Registry};
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which metadata map a patch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Labels,
    Annotations,
}

impl Field {
    /// Update mask naming this field.
    pub fn mask(self) -> &'static str {
        match self {
            Field::Labels => "labels",
            Field::Annotations => "annotations",
        }
    }

    /// Verb used in task descriptions.
    pub fn verb(self) -> &'static str {
        match self {
            Field::Labels => "label",
            Field::Annotations => "annotate",
        }
    }

    fn get<T: Labeled>(self, resource: &T) -> &Metadata {
        match self {
            Field::Labels => resource.labels(),
            Field::Annotations => resource.annotations(),
        }
    }

    fn get_mut<T: Labeled>(self, resource: &mut T) -> &mut Metadata {
        match self {
            Field::Labels => resource.labels_mut(),
            Field::Annotations => resource.annotations_mut(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mask())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{key:?} already has a value, overwrite is false")]
pub struct OverwriteConflict {
    pub key: String,
}

/// Keys to set and clear on one metadata map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labeling {
    pub overwrite: bool,
    pub set: BTreeMap<String, String>,
    pub clear: Vec<String>,
}

impl Labeling {
    /// Parses `key=value` (value may be empty) and `key-` operations.
    pub fn parse<S: AsRef<str>>(operations: &[S], overwrite: bool) -> Result<Self> {
        let mut labeling = Labeling {
            overwrite,
            ..Default::default()
        };
        for operation in operations {
            let operation = operation.as_ref();
            if let Some(key) = operation.strip_suffix('-').filter(|k| !k.is_empty()) {
                labeling.clear.push(key.to_string());
                continue;
            }
            let pair: Vec<&str> = operation.split('=').collect();
            if pair.len() != 2 {
                bail!(
                    "{operation:?} must have the form \"key=value\" (value can be empty) or \"key-\" (to remove the key)"
                );
            }
            if pair[0].is_empty() {
                bail!("{operation:?} is invalid because it specifies an empty key");
            }
            labeling.set.insert(pair[0].to_string(), pair[1].to_string());
        }
        Ok(labeling)
    }

    /// Computes the patched map, leaving `existing` untouched.
    ///
    /// Clears are applied before sets, so a key named in both ends up set.
    pub fn apply(&self, existing: &Metadata) -> Result<Metadata, OverwriteConflict> {
        if !self.overwrite {
            if let Some(key) = self.set.keys().find(|k| existing.contains_key(*k)) {
                return Err(OverwriteConflict { key: key.clone() });
            }
        }
        let mut patched = existing.clone();
        for key in &self.clear {
            patched.remove(key);
        }
        for (key, value) in &self.set {
            patched.insert(key.clone(), value.clone());
        }
        Ok(patched)
    }
}

/// Builds the task that patches one resource and writes back only `field`.
pub fn patch_task<C, T>(
    client: Arc<C>,
    mut resource: T,
    labeling: Arc<Labeling>,
    field: Field,
) -> Task
where
    C: Registry,
    T: Labeled,
{
    let description = format!("{} {}", field.verb(), resource.name());
    Task::new(description, async move {
        let patched = labeling.apply(field.get(&resource))?;
        *field.get_mut(&mut resource) = patched;
        client.update(&resource, &[field.mask()], false).await?;
        Ok(())
    })
}
