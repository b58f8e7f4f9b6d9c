//! Aggregation pipeline stages supported by the in-memory backend.
//!
//! Only stages needed for paging and simple reporting are evaluated:
//! `$match`, `$sort`, `$skip`, `$limit`, `$count`, `$project` and `$facet`.

use bson::{Bson, Document};

use docshape_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    operator,
    query::SortDirection,
};

use crate::{
    error::InMemoryStoreError,
    evaluator::{as_i64, matches, project, sort_documents, to_filters},
};

/// Runs `pipeline` over `documents`, stage by stage.
pub(crate) fn run_pipeline(
    mut documents: Vec<Document>,
    pipeline: &[Document],
) -> DocumentStoreResult<Vec<Document>> {
    for stage in pipeline {
        documents = run_stage(documents, stage)?;
    }

    Ok(documents)
}

fn run_stage(documents: Vec<Document>, stage: &Document) -> DocumentStoreResult<Vec<Document>> {
    let mut entries = stage.iter();
    let (name, argument) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(InMemoryStoreError::InvalidStage(format!("{stage} must have exactly one key")).into()),
    };

    match name.as_str() {
        operator::MATCH => {
            let filters = to_filters(stage_document(name, argument)?);

            let mut matched = Vec::new();
            for document in documents {
                if matches(&document, &filters)? {
                    matched.push(document);
                }
            }
            Ok(matched)
        },
        operator::SORT => {
            let keys = sort_keys(stage_document(name, argument)?)?;

            let mut documents = documents;
            sort_documents(&mut documents, &keys);
            Ok(documents)
        },
        operator::SKIP => {
            let skip = stage_count(name, argument)?;
            Ok(documents.into_iter().skip(skip).collect())
        },
        operator::LIMIT => {
            let limit = stage_count(name, argument)?;
            Ok(documents.into_iter().take(limit).collect())
        },
        operator::COUNT => {
            let Bson::String(field) = argument else {
                return Err(InMemoryStoreError::InvalidStage(format!("{name} requires a field name")).into());
            };

            // No input produces no output document.
            if documents.is_empty() {
                return Ok(Vec::new());
            }

            let total = i32::try_from(documents.len())
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(documents.len() as i64));

            let mut counted = Document::new();
            counted.insert(field.as_str(), total);
            Ok(vec![counted])
        },
        operator::PROJECT => {
            let projection = stage_document(name, argument)?;

            documents
                .into_iter()
                .map(|document| project(document, projection))
                .collect()
        },
        operator::FACET => {
            let facets = stage_document(name, argument)?;

            let mut output = Document::new();
            for (facet, sub_pipeline) in facets {
                let Bson::Array(stages) = sub_pipeline else {
                    return Err(InMemoryStoreError::InvalidStage(format!("facet {facet} must be an array of stages")).into());
                };

                let stages = stages
                    .iter()
                    .map(|stage| match stage {
                        Bson::Document(stage) => Ok(stage.clone()),
                        _ => Err(InMemoryStoreError::InvalidStage(format!("facet {facet} contains a non-document stage"))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let results = run_pipeline(documents.clone(), &stages)?;
                output.insert(
                    facet.as_str(),
                    results.into_iter().map(Bson::Document).collect::<Vec<_>>(),
                );
            }

            Ok(vec![output])
        },
        other => Err(InMemoryStoreError::UnsupportedStage(other.to_string()).into()),
    }
}

fn stage_document<'a>(name: &str, argument: &'a Bson) -> DocumentStoreResult<&'a Document> {
    match argument {
        Bson::Document(document) => Ok(document),
        _ => Err(InMemoryStoreError::InvalidStage(format!("{name} requires a document")).into()),
    }
}

fn stage_count(name: &str, argument: &Bson) -> DocumentStoreResult<usize> {
    as_i64(argument)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            DocumentStoreError::from(InMemoryStoreError::InvalidStage(format!(
                "{name} requires a non-negative integer"
            )))
        })
}

/// Parses `{ field: 1 | -1, .. }` into ordered sort keys.
pub(crate) fn sort_keys(keys: &Document) -> DocumentStoreResult<Vec<(String, SortDirection)>> {
    keys.iter()
        .map(|(field, direction)| match as_i64(direction) {
            Some(1) => Ok((field.clone(), SortDirection::Asc)),
            Some(-1) => Ok((field.clone(), SortDirection::Desc)),
            _ => Err(DocumentStoreError::from(InMemoryStoreError::InvalidStage(format!(
                "invalid sort direction for {field}"
            )))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn users() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "name": "Ivy", "level": 2 },
            doc! { "_id": 2, "name": "Asari", "level": 1 },
            doc! { "_id": 3, "name": "Joseph", "level": 3 },
        ]
    }

    #[test]
    fn match_sort_skip_limit() {
        let output = run_pipeline(
            users(),
            &[
                doc! { "$match": { "level": { "$gte": 2 } } },
                doc! { "$sort": { "level": -1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 5 },
                doc! { "$project": { "name": 1, "_id": 0 } },
            ],
        )
        .unwrap();

        assert_eq!(output, vec![doc! { "name": "Ivy" }]);
    }

    #[test]
    fn count_of_empty_input_is_empty() {
        let output = run_pipeline(users(), &[doc! { "$count": "total" }]).unwrap();
        assert_eq!(output, vec![doc! { "total": 3 }]);

        let output = run_pipeline(Vec::new(), &[doc! { "$count": "total" }]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn facet_runs_each_sub_pipeline() {
        let output = run_pipeline(
            users(),
            &[doc! {
                "$facet": {
                    "meta": [{ "$count": "total" }],
                    "data": [{ "$sort": { "_id": 1 } }, { "$skip": 2_i64 }, { "$limit": 1_i64 }],
                }
            }],
        )
        .unwrap();

        assert_eq!(
            output,
            vec![doc! {
                "meta": [{ "total": 3 }],
                "data": [{ "_id": 3, "name": "Joseph", "level": 3 }],
            }]
        );
    }

    #[test]
    fn unknown_and_malformed_stages_fail() {
        assert!(run_pipeline(users(), &[doc! { "$group": { "_id": "$level" } }]).is_err());
        assert!(run_pipeline(users(), &[doc! { "$skip": 1, "$limit": 1 }]).is_err());
        assert!(run_pipeline(users(), &[doc! { "$limit": -1 }]).is_err());
    }
}
