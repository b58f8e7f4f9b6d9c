//! Reserved operator tokens of the MongoDB wire vocabulary.
//!
//! These are used when building filters, update documents and aggregation
//! pipelines. The literals must match the server exactly.

// Aggregation stages and field update operators
pub const ADD_FIELDS: &str = "$addFields";
pub const BUCKET: &str = "$bucket";
pub const BUCKET_AUTO: &str = "$bucketAuto";
pub const COLL_STATS: &str = "$collStats";
pub const COUNT: &str = "$count";
pub const FACET: &str = "$facet";
pub const GEO_NEAR: &str = "$geoNear";
pub const GRAPH_LOOKUP: &str = "$graphLookup";
pub const GROUP: &str = "$group";
pub const INDEX_STATS: &str = "$indexStats";
pub const LIMIT: &str = "$limit";
pub const LIST_SESSIONS: &str = "$listSessions";
pub const LOOKUP: &str = "$lookup";
pub const MATCH: &str = "$match";
pub const MERGE: &str = "$merge";
pub const OUT: &str = "$out";
pub const PLAN_CACHE_STATS: &str = "$planCacheStats";
pub const PROJECT: &str = "$project";
pub const REDACT: &str = "$redact";
pub const REPLACE_ROOT: &str = "$replaceRoot";
pub const REPLACE_WITH: &str = "$replaceWith";
pub const SAMPLE: &str = "$sample";
pub const SET: &str = "$set";
pub const SKIP: &str = "$skip";
pub const SORT: &str = "$sort";
pub const SORT_BY_COUNT: &str = "$sortByCount";
pub const UNSET: &str = "$unset";
pub const MUL: &str = "$mul";
pub const INC: &str = "$inc";
pub const RENAME: &str = "$rename";
pub const UNWIND: &str = "$unwind";

// Accumulators
pub const AVG: &str = "$avg";
pub const MAX: &str = "$max";
pub const MIN: &str = "$min";
pub const STD_DEV_POP: &str = "$stdDevPop";
pub const STD_DEV_SAMP: &str = "$stdDevSamp";
pub const SUM: &str = "$sum";

// Array updates
pub const ADD_TO_SET: &str = "$addToSet";
pub const POP: &str = "$pop";
pub const PULL: &str = "$pull";
pub const PUSH: &str = "$push";
pub const PULL_ALL: &str = "$pullAll";

// Comparison
pub const EQ: &str = "$eq";
pub const GT: &str = "$gt";
pub const GTE: &str = "$gte";
pub const IN: &str = "$in";
pub const LT: &str = "$lt";
pub const LTE: &str = "$lte";
pub const NE: &str = "$ne";
pub const NIN: &str = "$nin";

// Logical
pub const AND: &str = "$and";
pub const NOT: &str = "$not";
pub const NOR: &str = "$nor";
pub const OR: &str = "$or";

// Element
pub const EXISTS: &str = "$exists";
pub const TYPE: &str = "$type";

// Evaluation
pub const EXPR: &str = "$expr";
pub const JSON_SCHEMA: &str = "$jsonSchema";
pub const MOD: &str = "$mod";
pub const REGEX: &str = "$regex";
pub const TEXT: &str = "$text";
pub const WHERE: &str = "$where";

// Geospatial
pub const GEO_INTERSECTS: &str = "$geoIntersects";
pub const GEO_WITHIN: &str = "$geoWithin";
pub const NEAR: &str = "$near";
pub const NEAR_SPHERE: &str = "$nearSphere";

// Array queries
pub const ALL: &str = "$all";
pub const ELEM_MATCH: &str = "$elemMatch";
pub const SIZE: &str = "$size";

// Bitwise
pub const BITS_ALL_CLEAR: &str = "$bitsAllClear";
pub const BITS_ALL_SET: &str = "$bitsAllSet";
pub const BITS_ANY_CLEAR: &str = "$bitsAnyClear";
pub const BITS_ANY_SET: &str = "$bitsAnySet";

pub const COMMENT: &str = "$comment";

// Projection
pub const DOLLAR: &str = "$";
pub const META: &str = "$meta";
pub const SLICE: &str = "$slice";

/// Keys of a `$lookup` stage body.
pub mod lookup {
    pub const FROM: &str = "from";
    pub const LOCAL_FIELD: &str = "localField";
    pub const FOREIGN_FIELD: &str = "foreignField";
    pub const AS: &str = "as";
    pub const LET: &str = "let";
    pub const PIPELINE: &str = "pipeline";
}
