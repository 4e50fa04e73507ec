//! Read-side SQL: table allow-lists, the predicate compiler and the engine client.

pub mod engine;
pub mod predicate;
pub mod tables;

pub use engine::{HttpQueryEngine, QueryEngine, Row};
pub use predicate::{
    escape_string, FilterOperator, FilterValue, PredicateCompiler, QueryFilter, ScalarValue,
    SelectQueryArgs, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT,
};
pub use tables::TableRegistry;
