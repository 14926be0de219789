//! Vocabulary: the names an API uses for schemas, properties, operations and
//! parameters, with occurrence counts.

use super::messages::{Vocabulary, WordCount};
use super::proto::ProtoDescription;
use super::{parse_document, SpecFormat};
use anyhow::Result;
use serde_yaml::Value;
use std::collections::BTreeMap;

const OPERATION_KEYS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(Default)]
struct Counter {
    schemas: BTreeMap<String, i32>,
    properties: BTreeMap<String, i32>,
    operations: BTreeMap<String, i32>,
    parameters: BTreeMap<String, i32>,
}

fn bump(words: &mut BTreeMap<String, i32>, word: &str) {
    if !word.is_empty() {
        *words.entry(word.to_string()).or_default() += 1;
    }
}

fn word_counts(words: BTreeMap<String, i32>) -> Vec<WordCount> {
    words
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect()
}

impl Counter {
    fn into_vocabulary(self) -> Vocabulary {
        Vocabulary {
            name: String::new(),
            schemas: word_counts(self.schemas),
            properties: word_counts(self.properties),
            operations: word_counts(self.operations),
            parameters: word_counts(self.parameters),
        }
    }

    /// Top-level schema names and the names of their direct properties.
    fn schemas(&mut self, schemas: Option<&Value>) {
        let Some(schemas) = schemas.and_then(Value::as_mapping) else {
            return;
        };
        for (name, schema) in schemas {
            bump(&mut self.schemas, name.as_str().unwrap_or_default());
            if let Some(properties) = schema.get("properties").and_then(Value::as_mapping) {
                for (property, _) in properties {
                    bump(&mut self.properties, property.as_str().unwrap_or_default());
                }
            }
        }
    }

    fn parameters(&mut self, parameters: Option<&Value>) {
        if let Some(parameters) = parameters.and_then(Value::as_sequence) {
            for parameter in parameters {
                if let Some(name) = parameter.get("name").and_then(Value::as_str) {
                    bump(&mut self.parameters, name);
                }
            }
        }
    }

    /// Operation ids plus path- and operation-level parameter names.
    fn paths(&mut self, paths: Option<&Value>) {
        let Some(paths) = paths.and_then(Value::as_mapping) else {
            return;
        };
        for (_, item) in paths {
            self.parameters(item.get("parameters"));
            for key in OPERATION_KEYS {
                let Some(operation) = item.get(key) else {
                    continue;
                };
                if let Some(id) = operation.get("operationId").and_then(Value::as_str) {
                    bump(&mut self.operations, id);
                }
                self.parameters(operation.get("parameters"));
            }
        }
    }

    /// Discovery methods are keyed by name; resources nest further methods.
    fn discovery_methods(&mut self, container: &Value) {
        if let Some(methods) = container.get("methods").and_then(Value::as_mapping) {
            for (name, method) in methods {
                bump(&mut self.operations, name.as_str().unwrap_or_default());
                if let Some(parameters) = method.get("parameters").and_then(Value::as_mapping) {
                    for (parameter, _) in parameters {
                        bump(&mut self.parameters, parameter.as_str().unwrap_or_default());
                    }
                }
            }
        }
        if let Some(resources) = container.get("resources").and_then(Value::as_mapping) {
            for (_, resource) in resources {
                self.discovery_methods(resource);
            }
        }
    }
}

/// Computes the vocabulary of an uncompressed spec.
pub fn summarize(format: SpecFormat, data: &[u8]) -> Result<Vocabulary> {
    Ok(match format {
        SpecFormat::OpenApiV2 => openapi_v2(&parse_document(data)?),
        SpecFormat::OpenApiV3 => openapi_v3(&parse_document(data)?),
        SpecFormat::Discovery => discovery(&parse_document(data)?),
        SpecFormat::ZippedProtos => protos(&ProtoDescription::from_zip(data)?),
    })
}

pub fn openapi_v2(document: &Value) -> Vocabulary {
    let mut counter = Counter::default();
    counter.schemas(document.get("definitions"));
    counter.paths(document.get("paths"));
    counter.into_vocabulary()
}

pub fn openapi_v3(document: &Value) -> Vocabulary {
    let mut counter = Counter::default();
    counter.schemas(document.get("components").and_then(|c| c.get("schemas")));
    counter.paths(document.get("paths"));
    counter.into_vocabulary()
}

pub fn discovery(document: &Value) -> Vocabulary {
    let mut counter = Counter::default();
    counter.schemas(document.get("schemas"));
    counter.discovery_methods(document);
    counter.into_vocabulary()
}

pub fn protos(description: &ProtoDescription) -> Vocabulary {
    let mut counter = Counter::default();
    for message in &description.messages {
        bump(&mut counter.schemas, &message.name);
        for field in &message.fields {
            bump(&mut counter.properties, field);
        }
    }
    for rpc in &description.rpcs {
        bump(&mut counter.operations, &rpc.name);
    }
    counter.into_vocabulary()
}

type Words = BTreeMap<String, i32>;

fn counts(words: &[WordCount]) -> Words {
    let mut counts = Words::new();
    for w in words {
        *counts.entry(w.word.clone()).or_default() += w.count;
    }
    counts
}

/// Applies `op` to each of the four word lists of `inputs` in turn.
fn combine<F>(inputs: &[&Vocabulary], op: F) -> Vocabulary
where
    F: Fn(&[Words]) -> Words,
{
    let section = |pick: fn(&Vocabulary) -> &[WordCount]| {
        let maps: Vec<Words> = inputs.iter().map(|v| counts(pick(v))).collect();
        word_counts(op(&maps))
    };
    Vocabulary {
        name: String::new(),
        schemas: section(|v| v.schemas.as_slice()),
        properties: section(|v| v.properties.as_slice()),
        operations: section(|v| v.operations.as_slice()),
        parameters: section(|v| v.parameters.as_slice()),
    }
}

fn union_of(maps: &[Words]) -> Words {
    let mut out = Words::new();
    for (word, count) in maps.iter().flatten() {
        *out.entry(word.clone()).or_default() += count;
    }
    out
}

fn intersection_of(maps: &[Words]) -> Words {
    let Some((first, rest)) = maps.split_first() else {
        return Words::new();
    };
    first
        .iter()
        .filter(|(word, _)| rest.iter().all(|m| m.contains_key(*word)))
        .map(|(word, count)| {
            let total = count + rest.iter().map(|m| m[word]).sum::<i32>();
            (word.clone(), total)
        })
        .collect()
}

fn difference_of(maps: &[Words]) -> Words {
    let Some((first, rest)) = maps.split_first() else {
        return Words::new();
    };
    first
        .iter()
        .filter(|(word, _)| !rest.iter().any(|m| m.contains_key(*word)))
        .map(|(word, count)| (word.clone(), *count))
        .collect()
}

/// Every word used by any input, with counts summed.
pub fn union(inputs: &[Vocabulary]) -> Vocabulary {
    combine(&inputs.iter().collect::<Vec<_>>(), union_of)
}

/// Words used by every input, with counts summed.
pub fn intersection(inputs: &[Vocabulary]) -> Vocabulary {
    combine(&inputs.iter().collect::<Vec<_>>(), intersection_of)
}

/// Words of the first input that no other input uses.
pub fn difference(inputs: &[Vocabulary]) -> Vocabulary {
    combine(&inputs.iter().collect::<Vec<_>>(), difference_of)
}

/// For each input, the words that no other input uses.
pub fn unique(inputs: &[Vocabulary]) -> Vec<Vocabulary> {
    (0..inputs.len())
        .map(|i| {
            let mut ordered = vec![&inputs[i]];
            ordered.extend(inputs.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, v)| v));
            combine(&ordered, difference_of)
        })
        .collect()
}
